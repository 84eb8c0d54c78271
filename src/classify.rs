// src/classify.rs
//! Article classification seam: accept/reject against a plain-language
//! criteria prompt. Consumed by the pipeline as an opaque service; the
//! OpenAI provider here is one implementation of it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::ingest::types::Article;

/// Accept/reject verdict for one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub accept: bool,
    pub reason: String,
}

#[async_trait]
pub trait ArticleClassifier: Send + Sync {
    async fn classify(&self, article: &Article, criteria: &str) -> Result<Verdict, ClassifyError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Chat-completions classifier. One short yes/no call per article.
pub struct OpenAiClassifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rss-feed-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model,
        }
    }

    fn prompt(article: &Article, criteria: &str) -> String {
        format!(
            "Determine if the following article is relevant based on this criteria:\n\
             \"{criteria}\"\n\n\
             Article Title: {}\n\
             Article Summary: {}\n\n\
             Answer with a single word: \"Yes\" or \"No\".",
            article.title,
            article.summary.as_deref().unwrap_or("(none)"),
        )
    }
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMsg,
}

#[derive(Deserialize)]
struct ChatChoiceMsg {
    content: String,
}

pub(crate) async fn chat_completion(
    http: &reqwest::Client,
    api_key: &str,
    req: &ChatReqOwned,
) -> Result<String, reqwest::Error> {
    let resp = http
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(api_key)
        .json(req)
        .send()
        .await?
        .error_for_status()?;
    let body: ChatResp = resp.json().await?;
    Ok(body
        .choices
        .first()
        .map(|c| c.message.content.trim().to_string())
        .unwrap_or_default())
}

/// Owned request form shared with the synthesizer.
#[derive(Serialize)]
pub(crate) struct ChatReqOwned {
    pub model: String,
    pub messages: Vec<ChatMsgOwned>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Serialize)]
pub(crate) struct ChatMsgOwned {
    pub role: &'static str,
    pub content: String,
}

#[async_trait]
impl ArticleClassifier for OpenAiClassifier {
    async fn classify(&self, article: &Article, criteria: &str) -> Result<Verdict, ClassifyError> {
        if self.api_key.is_empty() {
            return Err(ClassifyError::Unavailable("no API key configured".into()));
        }

        let req = ChatReqOwned {
            model: self.model.clone(),
            messages: vec![
                ChatMsgOwned {
                    role: "system",
                    content: "Evaluate whether this article is relevant.".into(),
                },
                ChatMsgOwned {
                    role: "user",
                    content: Self::prompt(article, criteria),
                },
            ],
            temperature: 0.0,
            max_tokens: 5,
        };

        let answer = chat_completion(&self.http, &self.api_key, &req).await?;
        if answer.is_empty() {
            return Err(ClassifyError::Malformed("empty completion".into()));
        }
        let accept = answer.to_ascii_lowercase().contains("yes");
        Ok(Verdict {
            accept,
            reason: answer,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Pass-through classifier for runs without a configured provider. Accepts
/// everything so the pipeline still works end to end; selected explicitly
/// at configuration time.
pub struct AcceptAllClassifier;

#[async_trait]
impl ArticleClassifier for AcceptAllClassifier {
    async fn classify(&self, _article: &Article, _criteria: &str) -> Result<Verdict, ClassifyError> {
        Ok(Verdict {
            accept: true,
            reason: "filtering disabled".into(),
        })
    }

    fn name(&self) -> &'static str {
        "accept-all"
    }
}
