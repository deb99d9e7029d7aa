// src/alert/email.rs
use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{AlertContext, AlertDispatcher};

pub struct EmailDispatcher {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailDispatcher {
    /// Transport from `SMTP_HOST`/`SMTP_USER`/`SMTP_PASS` plus
    /// `ALERT_EMAIL_FROM`/`ALERT_EMAIL_TO`. Fails instead of panicking so a
    /// misconfigured mailer just disables email alerts.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SMTP_HOST").context("SMTP_HOST missing")?;
        let user = std::env::var("SMTP_USER").context("SMTP_USER missing")?;
        let pass = std::env::var("SMTP_PASS").context("SMTP_PASS missing")?;
        let from_addr = std::env::var("ALERT_EMAIL_FROM").context("ALERT_EMAIL_FROM missing")?;
        let to_addr = std::env::var("ALERT_EMAIL_TO").context("ALERT_EMAIL_TO missing")?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = from_addr.parse().context("invalid ALERT_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid ALERT_EMAIL_TO")?;

        Ok(Self { mailer, from, to })
    }
}

#[async_trait::async_trait]
impl AlertDispatcher for EmailDispatcher {
    async fn send(&self, subject: &str, body: &str, _ctx: &AlertContext) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
