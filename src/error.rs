// src/error.rs
//! Error taxonomy for the pipeline stages.
//!
//! Per-source errors (`SourceError`) are absorbed inside the fetch stage and
//! never escalate past it. The service errors are run-level: the pipeline
//! converts them into a single terminal outcome tag, never an unhandled fault.

use thiserror::Error;

/// A failure confined to one feed source. Degrades that source to zero
/// articles for the batch; the other sources are unaffected.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {0}")]
    Status(u16),
    #[error("feed parse failed: {0}")]
    Parse(String),
}

/// Classification service failure for one article. The article is excluded
/// from the current run instead of being silently accepted.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classification response malformed: {0}")]
    Malformed(String),
    #[error("classification service unavailable: {0}")]
    Unavailable(String),
}

/// Synthesis service failure. Run-level: the invocation ends as failed and
/// no history is committed for the affected articles.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("synthesis returned malformed output: {0}")]
    Malformed(String),
    #[error("synthesis service unavailable: {0}")]
    Unavailable(String),
}
