// src/publish/latest.rs
//! Latest-report artifact: one JSON document overwritten after every
//! successful publish, for dashboard-style consumption.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::Report;

pub struct LatestReportStore {
    path: PathBuf,
}

impl LatestReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Atomic overwrite (tmp + rename), same discipline as the durable
    /// stores. Called only after a successful publish.
    pub fn save(&self, report: &Report) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).context("create report dir")?;
            }
        }
        let json = serde_json::to_vec_pretty(report).context("serialize report")?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = std::fs::File::create(&tmp).context("create tmp report")?;
        f.write_all(&json).context("write tmp report")?;
        std::fs::rename(&tmp, &self.path).context("replace latest report")?;
        Ok(())
    }

    /// Load the last written report, if any (used by tests and tooling).
    pub fn load(&self) -> Option<Report> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }
}
