// src/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "HARVEST_CONFIG_PATH";

/// Tunables for one pass. Defaults match the production monitor: 60 s job
/// timeout, 10-run history, alert after 3 consecutive failures, re-alert at
/// most once per 24 h.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub job_timeout_secs: u64,
    pub parallelism: usize,
    pub history_len: usize,
    pub alert_threshold: u32,
    pub alert_cooldown_hours: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: 60,
            parallelism: 4,
            history_len: 10,
            alert_threshold: 3,
            alert_cooldown_hours: 24,
        }
    }
}

impl PipelineConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let cfg: Self = toml::from_str(&content)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        cfg.validate()
    }

    /// Load using env var + fallbacks:
    /// 1) $HARVEST_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    /// Individual env overrides (`HARVEST_JOB_TIMEOUT_SECS`, ...) apply last.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("HARVEST_CONFIG_PATH points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/pipeline.toml");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.validate()
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("HARVEST_JOB_TIMEOUT_SECS") {
            self.job_timeout_secs = v;
        }
        if let Some(v) = env_parse("HARVEST_PARALLELISM") {
            self.parallelism = v;
        }
        if let Some(v) = env_parse("HARVEST_HISTORY_LEN") {
            self.history_len = v;
        }
        if let Some(v) = env_parse("HARVEST_ALERT_THRESHOLD") {
            self.alert_threshold = v;
        }
        if let Some(v) = env_parse("HARVEST_ALERT_COOLDOWN_HOURS") {
            self.alert_cooldown_hours = v;
        }
    }

    fn validate(self) -> Result<Self> {
        if self.job_timeout_secs == 0 {
            return Err(anyhow!("job_timeout_secs must be at least 1"));
        }
        if self.parallelism == 0 {
            return Err(anyhow!("parallelism must be at least 1"));
        }
        if self.history_len == 0 {
            return Err(anyhow!("history_len must be at least 1"));
        }
        Ok(self)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn defaults_match_monitoring_policy() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.job_timeout_secs, 60);
        assert_eq!(cfg.history_len, 10);
        assert_eq!(cfg.alert_threshold, 3);
        assert_eq!(cfg.alert_cooldown_hours, 24);
    }

    #[test]
    fn toml_partial_override_keeps_defaults() {
        let cfg: PipelineConfig = toml::from_str("alert_threshold = 5\nparallelism = 2\n").unwrap();
        assert_eq!(cfg.alert_threshold, 5);
        assert_eq!(cfg.parallelism, 2);
        assert_eq!(cfg.job_timeout_secs, 60);
    }

    #[test]
    fn zero_values_rejected() {
        let cfg: PipelineConfig = toml::from_str("parallelism = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_path_and_overrides_win() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("pipeline.toml");
        std::fs::write(&p, "alert_threshold = 7\n").unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var("HARVEST_PARALLELISM", "8");
        let cfg = PipelineConfig::load_default().unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var("HARVEST_PARALLELISM");

        assert_eq!(cfg.alert_threshold, 7);
        assert_eq!(cfg.parallelism, 8);
    }
}
