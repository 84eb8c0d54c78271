// src/publish/console.rs
use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{Publisher, Report};

/// Prints the structured report as pretty JSON to stdout.
pub struct ConsolePublisher;

#[async_trait]
impl Publisher for ConsolePublisher {
    async fn publish(&self, report: &Report) -> Result<()> {
        let json = serde_json::to_string_pretty(report).context("serialize report")?;
        println!("{json}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
