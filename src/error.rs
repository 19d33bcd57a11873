//! Error taxonomy for the ingest pipeline.
//!
//! Every error here is fatal for **one year only**: the driver catches it at the
//! year boundary and records a [`YearStatus::Failed`](crate::report::YearStatus)
//! outcome. Per-cell coercion problems are not errors at all; they surface as
//! [`ParseWarning`](crate::standardize::ParseWarning) values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Role a member file plays inside a yearly archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Samples,
    Results,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Samples => f.write_str("samples"),
            Self::Results => f.write_str("results"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unreadable archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("missing required {role} file in {archive}")]
    MissingFile { archive: PathBuf, role: FileRole },

    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("convert rows for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_arrow::Error,
    },

    #[error("write parquet {path}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("output directory {0} already holds partitions")]
    OutputExists(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Archive,
    Schema,
    Io,
    Output,
    Config,
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Archive { .. } => ErrorKind::Archive,
            Self::MissingFile { .. } => ErrorKind::Schema,
            Self::Read { .. } | Self::Io { .. } => ErrorKind::Io,
            Self::Encode { .. } | Self::Parquet { .. } | Self::OutputExists(_) => {
                ErrorKind::Output
            }
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
