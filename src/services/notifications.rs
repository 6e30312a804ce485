//! Email digest of newly mirrored items
//!
//! One message per run, and only when the run captured something. Mail is a
//! side channel: missing configuration or a relay failure is logged and the
//! run carries on.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info, warn};

use crate::config::SmtpConfig;
use crate::jobs::sync_run::RunReport;

/// Subject line of every digest
pub const DIGEST_SUBJECT: &str = "[vod-mirror] New VODs downloaded";

const DIGEST_HEADER: &str = "New VODs downloaded this run:";

/// Something that can deliver a plaintext message to the operator
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// SMTP delivery with STARTTLS and password login
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("Invalid sender address '{}'", config.from))?;
        let to: Mailbox = config
            .to
            .parse()
            .with_context(|| format!("Invalid recipient address '{}'", config.to))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP relay '{}'", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("Failed to build email")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        Ok(())
    }
}

/// Formats run reports and hands them to the mail transport
#[derive(Clone, Default)]
pub struct Notifier {
    transport: Option<Arc<dyn MailTransport>>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// A notifier that only logs
    pub fn disabled() -> Self {
        Self { transport: None }
    }

    /// Build from SMTP settings. Incomplete or invalid settings disable mail.
    pub fn from_config(smtp: Option<&SmtpConfig>) -> Self {
        let Some(smtp) = smtp else {
            info!("SMTP not fully configured; email notifications disabled");
            return Self::disabled();
        };

        match SmtpMailer::new(smtp) {
            Ok(mailer) => {
                info!(host = %smtp.host, port = smtp.port, to = %smtp.to, "Email notifications enabled");
                Self::new(Arc::new(mailer))
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Invalid SMTP settings; email notifications disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Send the digest for a run. Never fails; an empty report sends nothing.
    pub async fn notify(&self, report: &RunReport) {
        if report.is_empty() {
            return;
        }

        let Some(transport) = &self.transport else {
            info!(
                new_items = report.total_items(),
                "SMTP not fully configured; skipping email notification"
            );
            return;
        };

        let body = format_report(report);
        match transport.send(DIGEST_SUBJECT, &body).await {
            Ok(()) => info!(
                channels = report.channels.len(),
                new_items = report.total_items(),
                "Email notification sent"
            ),
            Err(e) => error!(error = %format!("{:#}", e), "Failed to send email notification"),
        }
    }
}

/// One line per channel: `<channel>: <n> new item(s): <id>, <id>`
pub fn format_report(report: &RunReport) -> String {
    let lines: Vec<String> = report
        .channels
        .iter()
        .map(|entry| {
            format!(
                "{}: {} new item(s): {}",
                entry.channel,
                entry.items.len(),
                entry.items.join(", ")
            )
        })
        .collect();

    format!("{}\n\n{}", DIGEST_HEADER, lines.join("\n"))
}
