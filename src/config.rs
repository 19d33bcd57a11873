//! Pipeline configuration.
//!
//! All directory and tuning knobs live in one explicit [`PipelineConfig`] that
//! is passed into each component. Nothing is read from process-wide state.
//!
//! A config can be built in code (every field has a default), loaded from TOML,
//! and then overridden field by field by the CLI.
//!
//! ```
//! use pdp_ingest::config::PipelineConfig;
//!
//! let cfg = PipelineConfig::from_toml_str(r#"
//!     input_dir = "archives"
//!     chunk_size = 50000
//!     compression = "zstd"
//!
//!     [expected_years]
//!     from = 1994
//!     to = 2023
//! "#)?;
//! assert_eq!(cfg.chunk_size, 50_000);
//! # Ok::<(), pdp_ingest::PipelineError>(())
//! ```

use crate::error::{PipelineError, Result};
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the first row of a delimited member file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum HeaderMode {
    /// Header iff one of the first row's fields names the sample key column.
    #[default]
    Auto,
    /// The first row is always a header.
    Present,
    /// No header; columns follow the data-dictionary layout.
    Absent,
}

/// Parquet page compression for written partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum OutputCompression {
    None,
    #[default]
    Snappy,
    Zstd,
    Gzip,
}

impl OutputCompression {
    #[must_use]
    pub fn to_parquet(self) -> Compression {
        match self {
            Self::None => Compression::UNCOMPRESSED,
            Self::Snappy => Compression::SNAPPY,
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Self::Gzip => Compression::GZIP(GzipLevel::default()),
        }
    }
}

/// Inclusive range of years the run is expected to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl YearRange {
    #[must_use]
    pub fn contains(&self, year: i32) -> bool {
        (self.from..=self.to).contains(&year)
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> {
        self.from..=self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory scanned for yearly archives.
    pub input_dir: PathBuf,
    /// Glob matched against file names inside `input_dir`.
    pub archive_pattern: String,
    /// Root of the `year=<Y>` partition tree.
    pub output_dir: PathBuf,
    /// Parent of the per-year scratch directories. `None` uses the system temp dir.
    pub work_dir: Option<PathBuf>,
    /// Maximum result rows per partition.
    pub chunk_size: usize,
    pub header: HeaderMode,
    pub delimiter: char,
    pub compression: OutputCompression,
    /// Clear an existing `year=<Y>` directory instead of failing the year.
    pub overwrite: bool,
    /// Process years concurrently, one year per worker.
    pub parallel: bool,
    /// Worker count when `parallel` is set. `None` uses the CPU count.
    pub threads: Option<usize>,
    pub expected_years: Option<YearRange>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/zipped"),
            archive_pattern: "*.zip".to_string(),
            output_dir: PathBuf::from("data/parquet"),
            work_dir: None,
            chunk_size: 250_000,
            header: HeaderMode::Auto,
            delimiter: '|',
            compression: OutputCompression::Snappy,
            overwrite: false,
            parallel: false,
            threads: None,
            expected_years: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] on malformed TOML, unknown keys, or
    /// values rejected by [`validate`](Self::validate).
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).map_err(|e| PipelineError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a TOML config file.
    ///
    /// # Errors
    /// Returns [`PipelineError::Io`] if the file cannot be read, otherwise see
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be at least 1".into()));
        }
        if self.threads == Some(0) {
            return Err(PipelineError::Config("threads must be at least 1".into()));
        }
        if !self.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "delimiter {:?} is not a single ASCII byte",
                self.delimiter
            )));
        }
        if let Some(range) = self.expected_years
            && range.from > range.to
        {
            return Err(PipelineError::Config(format!(
                "expected_years.from ({}) is after expected_years.to ({})",
                range.from, range.to
            )));
        }
        if self.archive_pattern.trim().is_empty() {
            return Err(PipelineError::Config("archive_pattern is empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees an ASCII delimiter
        u8::try_from(self.delimiter).unwrap_or(b'|')
    }

    #[must_use]
    pub fn work_root(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}
