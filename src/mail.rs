use anyhow::Context;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;

/// Outbound message handed to a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

/// SMTP delivery over STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let from: Mailbox = cfg
            .from
            .parse()
            .context("SMTP_FROM is not a valid email address")?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("create SMTP transport")?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        let to: Mailbox = email.to.parse().context("invalid recipient address")?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .body(email.body)
            .context("build email message")?;
        self.transport
            .send(message)
            .await
            .context("send email via SMTP")?;
        Ok(())
    }
}

/// Used when SMTP is not configured: the message only goes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, body = %email.body, "email (not sent, SMTP disabled)");
        Ok(())
    }
}

#[cfg(test)]
pub use testing::RecordingMailer;

#[cfg(test)]
mod testing {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use async_trait::async_trait;

    use super::{Email, Mailer};

    /// Keeps every message; can be switched to fail.
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
        fail: AtomicBool,
    }

    impl RecordingMailer {
        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<Email> {
            self.sent.lock().unwrap().clone()
        }

        /// Raw reset secret from the last reset link sent.
        pub fn last_reset_secret(&self) -> Option<String> {
            let sent = self.sent.lock().unwrap();
            let body = &sent.last()?.body;
            let (_, rest) = body.split_once("/password/reset/")?;
            rest.split_whitespace().next().map(str::to_string)
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: Email) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("mail server unavailable");
            }
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }
}
