//! Per-year outcomes and the run report.
//!
//! Every archive the driver sees, and every expected year it does not, ends up
//! as exactly one [`YearOutcome`]. The report can be logged as a summary or
//! saved as JSON for downstream checks.

use crate::engine::YearStats;
use crate::error::{ErrorKind, PipelineError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No plausible year in the archive's file name.
    NoYear,
    /// An expected year had no archive.
    NoArchive,
    /// Another archive already claimed this year.
    DuplicateYear,
    /// The year lies outside the configured range.
    OutsideRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum YearStatus {
    Processed(YearStats),
    Skipped { reason: SkipReason },
    Failed { kind: ErrorKind, message: String },
}

impl YearStatus {
    #[must_use]
    pub fn failed(err: &PipelineError) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearOutcome {
    pub year: Option<i32>,
    pub archive: Option<PathBuf>,
    #[serde(flatten)]
    pub status: YearStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<YearOutcome>,
    pub elapsed_ms: u64,
}

impl RunReport {
    #[must_use]
    pub fn new(mut outcomes: Vec<YearOutcome>, elapsed: Duration) -> Self {
        // undated archives sort last, by path
        outcomes.sort_by(|a, b| {
            (a.year.is_none(), a.year, &a.archive).cmp(&(b.year.is_none(), b.year, &b.archive))
        });
        Self {
            outcomes,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    #[must_use]
    pub fn outcome(&self, year: i32) -> Option<&YearOutcome> {
        self.outcomes.iter().find(|o| o.year == Some(year))
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.count(|s| matches!(s, YearStatus::Processed(_)))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, YearStatus::Skipped { .. }))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, YearStatus::Failed { .. }))
    }

    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                YearStatus::Processed(stats) => Some(stats.rows),
                _ => None,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&YearStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    /// Emit one event per year plus a totals line.
    pub fn log_summary(&self) {
        for o in &self.outcomes {
            let year = o.year.map_or_else(|| "?".to_string(), |y| y.to_string());
            let archive = o
                .archive
                .as_deref()
                .map_or_else(String::new, |p| p.display().to_string());
            match &o.status {
                YearStatus::Processed(s) => info!(
                    %year,
                    partitions = s.partitions,
                    rows = s.rows,
                    unmatched = s.unmatched_rows,
                    parse_warnings = s.parse_warnings,
                    "processed"
                ),
                YearStatus::Skipped { reason } => warn!(%year, %archive, ?reason, "skipped"),
                YearStatus::Failed { kind, message } => {
                    error!(%year, %archive, ?kind, %message, "failed");
                }
            }
        }
        info!(
            processed = self.processed(),
            skipped = self.skipped(),
            failed = self.failed(),
            rows = self.total_rows(),
            elapsed_ms = self.elapsed_ms,
            "run complete"
        );
    }

    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")
    }
}
