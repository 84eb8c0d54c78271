// src/publish/email.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Publisher, Report};

/// Sends the report as a plain-text email over SMTP.
pub struct EmailPublisher {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    to: Option<Mailbox>,
}

impl EmailPublisher {
    /// Reads SMTP_HOST / SMTP_USER / SMTP_PASS / REPORT_EMAIL_FROM /
    /// REPORT_EMAIL_TO. Missing or invalid values surface at publish time
    /// so a misconfigured sink fails the run instead of panicking at boot.
    pub fn from_env() -> Self {
        let build = || -> Result<(AsyncSmtpTransport<Tokio1Executor>, Mailbox, Mailbox)> {
            let host = std::env::var("SMTP_HOST").context("SMTP_HOST missing")?;
            let user = std::env::var("SMTP_USER").context("SMTP_USER missing")?;
            let pass = std::env::var("SMTP_PASS").context("SMTP_PASS missing")?;
            let from_addr =
                std::env::var("REPORT_EMAIL_FROM").context("REPORT_EMAIL_FROM missing")?;
            let to_addr = std::env::var("REPORT_EMAIL_TO").context("REPORT_EMAIL_TO missing")?;

            let creds = Credentials::new(user, pass);
            let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
                .context("invalid SMTP_HOST")?
                .credentials(creds)
                .build();
            let from = from_addr.parse().context("invalid REPORT_EMAIL_FROM")?;
            let to = to_addr.parse().context("invalid REPORT_EMAIL_TO")?;
            Ok((mailer, from, to))
        };

        match build() {
            Ok((mailer, from, to)) => Self {
                mailer: Some(mailer),
                from: Some(from),
                to: Some(to),
            },
            Err(e) => {
                tracing::warn!(error = %e, "email sink not fully configured");
                Self {
                    mailer: None,
                    from: None,
                    to: None,
                }
            }
        }
    }

    fn render_plaintext(report: &Report) -> String {
        let mut body = format!(
            "News Summary — {}\n\n",
            report.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        for group in &report.topics {
            body.push_str(&format!("## {}\n{}\n", group.topic, group.summary));
            for article in &group.articles {
                body.push_str(&format!("  - {} <{}>\n", article.title, article.link));
            }
            body.push('\n');
        }
        body
    }
}

#[async_trait]
impl Publisher for EmailPublisher {
    async fn publish(&self, report: &Report) -> Result<()> {
        let (Some(mailer), Some(from), Some(to)) = (&self.mailer, &self.from, &self.to) else {
            return Err(anyhow!("email sink selected but SMTP settings are incomplete"));
        };

        let subject = format!(
            "News Summary — {} topics, {} articles",
            report.topics.len(),
            report.article_count()
        );
        let msg = Message::builder()
            .from(from.clone())
            .to(to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(Self::render_plaintext(report))
            .context("build email")?;

        mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
