// src/synthesize.rs
//! Topic synthesis seam: turns the surviving articles into topic groups
//! with one generated summary each. Two-phase in the OpenAI provider:
//! grouping (strict JSON) and per-topic summarization.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::classify::{chat_completion, ChatMsgOwned, ChatReqOwned};
use crate::error::SynthesisError;
use crate::ingest::types::Article;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicArticle {
    pub title: String,
    pub link: String,
}

/// A cluster of related articles with one generated summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicGroup {
    pub topic: String,
    pub summary: String,
    pub articles: Vec<TopicArticle>,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// An empty result is valid: "no coherent topics".
    async fn synthesize(&self, articles: &[Article]) -> Result<Vec<TopicGroup>, SynthesisError>;
    fn name(&self) -> &'static str;
}

/// Chat-completions synthesizer: one grouping call, then one summary call
/// per topic.
pub struct OpenAiSynthesizer {
    http: reqwest::Client,
    api_key: String,
    group_model: String,
    summarize_model: String,
}

#[derive(Deserialize)]
struct GroupingResponse {
    #[serde(default)]
    topics: Vec<GroupedTopic>,
}

#[derive(Deserialize)]
struct GroupedTopic {
    topic: String,
    #[serde(default)]
    articles: Vec<TopicArticle>,
}

impl OpenAiSynthesizer {
    pub fn new(
        api_key: String,
        group_model: String,
        summarize_model: String,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rss-feed-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            group_model,
            summarize_model,
        }
    }

    fn grouping_prompt(articles: &[Article]) -> String {
        let listing = articles
            .iter()
            .map(|a| {
                format!(
                    "Title: {}, Summary: {}, Link: {}",
                    serde_json::to_string(&a.title).unwrap_or_default(),
                    serde_json::to_string(a.summary.as_deref().unwrap_or_default())
                        .unwrap_or_default(),
                    serde_json::to_string(a.link.as_deref().unwrap_or_default())
                        .unwrap_or_default(),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "You will be given a set of news articles. Group them into topics based on \
             similarity, and provide a JSON response strictly in the following format:\n\n\
             {{\n    \"topics\": [\n        {{\n            \"topic\": \"Topic Name\",\n            \
             \"articles\": [\n                {{\"title\": \"Article Title\", \"link\": \"Article Link\"}}\n            ]\n        }}\n    ]\n}}\n\n\
             Ensure:\n\
             - The response is always valid JSON.\n\
             - Each \"title\" and \"link\" is properly enclosed in double quotes.\n\
             - No extra comments or explanations in the response.\n\n\
             Articles:\n{listing}"
        )
    }

    fn summary_prompt(topic: &str, members: &[&Article]) -> String {
        let combined = members
            .iter()
            .map(|a| {
                format!(
                    "Title: {}, Summary: {}",
                    serde_json::to_string(&a.title).unwrap_or_default(),
                    serde_json::to_string(a.summary.as_deref().unwrap_or_default())
                        .unwrap_or_default(),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Summarize the following articles that belong to the topic \"{topic}\" in a \
             concise paragraph.\n\n{combined}\n\n\
             Ensure:\n- The response is a single paragraph.\n- No extra explanations."
        )
    }

    async fn group(&self, articles: &[Article]) -> Result<Vec<GroupedTopic>, SynthesisError> {
        let req = ChatReqOwned {
            model: self.group_model.clone(),
            messages: vec![
                ChatMsgOwned {
                    role: "system",
                    content: "You are an AI that groups news articles into related topics \
                              and provides strictly valid JSON."
                        .into(),
                },
                ChatMsgOwned {
                    role: "user",
                    content: Self::grouping_prompt(articles),
                },
            ],
            temperature: 0.2,
            max_tokens: 800,
        };

        let raw = chat_completion(&self.http, &self.api_key, &req).await?;
        let parsed: GroupingResponse = serde_json::from_str(strip_code_fences(&raw))
            .map_err(|e| SynthesisError::Malformed(format!("grouping JSON: {e}")))?;
        Ok(parsed.topics)
    }

    async fn summarize(&self, topic: &str, members: &[&Article]) -> Result<String, SynthesisError> {
        let req = ChatReqOwned {
            model: self.summarize_model.clone(),
            messages: vec![
                ChatMsgOwned {
                    role: "system",
                    content: "You are an AI that summarizes news articles into a single \
                              paragraph."
                        .into(),
                },
                ChatMsgOwned {
                    role: "user",
                    content: Self::summary_prompt(topic, members),
                },
            ],
            temperature: 0.3,
            max_tokens: 150,
        };

        let summary = chat_completion(&self.http, &self.api_key, &req).await?;
        if summary.is_empty() {
            return Err(SynthesisError::Malformed(format!(
                "empty summary for topic \"{topic}\""
            )));
        }
        Ok(summary)
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, articles: &[Article]) -> Result<Vec<TopicGroup>, SynthesisError> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }
        if self.api_key.is_empty() {
            return Err(SynthesisError::Unavailable("no API key configured".into()));
        }

        let grouped = self.group(articles).await?;
        let mut out = Vec::with_capacity(grouped.len());
        for group in grouped {
            // Map the model's member list back onto the real articles by
            // title; hallucinated members drop out here.
            let members: Vec<&Article> = group
                .articles
                .iter()
                .filter_map(|m| articles.iter().find(|a| a.title == m.title))
                .collect();
            if members.is_empty() {
                tracing::debug!(topic = %group.topic, "topic had no known members, skipped");
                continue;
            }
            let summary = self.summarize(&group.topic, &members).await?;
            out.push(TopicGroup {
                topic: group.topic,
                summary,
                articles: members
                    .iter()
                    .map(|a| TopicArticle {
                        title: a.title.clone(),
                        link: a.link.clone().unwrap_or_default(),
                    })
                    .collect(),
            });
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Fallback for runs without a configured provider: everything lands in one
/// topic, summarized as the joined headline list.
pub struct SingleTopicSynthesizer;

#[async_trait]
impl Synthesizer for SingleTopicSynthesizer {
    async fn synthesize(&self, articles: &[Article]) -> Result<Vec<TopicGroup>, SynthesisError> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }
        let summary = articles
            .iter()
            .map(|a| a.title.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Ok(vec![TopicGroup {
            topic: "Latest articles".into(),
            summary,
            articles: articles
                .iter()
                .map(|a| TopicArticle {
                    title: a.title.clone(),
                    link: a.link.clone().unwrap_or_default(),
                })
                .collect(),
        }])
    }

    fn name(&self) -> &'static str {
        "single-topic"
    }
}

/// Models occasionally wrap JSON in markdown fences despite instructions.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn grouping_response_parses() {
        let raw = r#"{"topics":[{"topic":"Rates","articles":[{"title":"T1","link":"L1"}]}]}"#;
        let parsed: GroupingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.topics.len(), 1);
        assert_eq!(parsed.topics[0].articles[0].title, "T1");
    }
}
