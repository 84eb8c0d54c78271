// src/publish/slack.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{Publisher, Report};

/// Posts the report to a Slack incoming webhook as Block Kit blocks.
pub struct SlackPublisher {
    webhook_url: Option<String>,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl SlackPublisher {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("SLACK_WEBHOOK_URL").ok(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    /// Optional builder for tests/tools
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: Some(url),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    fn blocks(report: &Report) -> serde_json::Value {
        let mut blocks = vec![
            serde_json::json!({
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": format!(
                        "📰 News Summary | {}",
                        report.generated_at.format("%Y-%m-%d %H:%M")
                    ),
                    "emoji": true
                }
            }),
            serde_json::json!({ "type": "divider" }),
        ];

        for group in &report.topics {
            blocks.push(serde_json::json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*{}*", group.topic) }
            }));
            blocks.push(serde_json::json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": group.summary }
            }));
            if !group.articles.is_empty() {
                let mut link_text = String::from("*Articles:*\n");
                for (idx, article) in group.articles.iter().enumerate() {
                    link_text.push_str(&format!(
                        "{}. <{}|{}>\n",
                        idx + 1,
                        article.link,
                        article.title
                    ));
                }
                blocks.push(serde_json::json!({
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": link_text }
                }));
            }
            blocks.push(serde_json::json!({ "type": "divider" }));
        }

        serde_json::json!({ "blocks": blocks })
    }
}

#[async_trait]
impl Publisher for SlackPublisher {
    async fn publish(&self, report: &Report) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            return Err(anyhow!("slack sink selected but SLACK_WEBHOOK_URL is unset"));
        };

        let payload = Self::blocks(report);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(e).context("slack webhook non-2xx");
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(e).context("slack webhook request failed");
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
