//! Pipe-delimited text ingestion.
//!
//! This module provides:
//! - **Whole-file reads** for small inputs: [`read_frame`]
//! - **Bounded batches** for large inputs: [`ChunkedReader`], an iterator of
//!   [`RawFrame`]s holding at most `chunk_size` rows each
//!
//! # Design notes
//! - Quoting is disabled: archive text carries stray `"` characters that would
//!   otherwise swallow delimiters and line breaks.
//! - Rows are flexible in width; short rows read as absent trailing cells.
//! - Bytes are decoded lossily, so legacy Latin-1 text never aborts a year.
//! - The header decision is made once from the first record (see
//!   [`HeaderMode`]); headerless files are named from a fixed layout.
//! - The sequence is restartable only by reopening the file. There is no
//!   mid-stream resume.

use crate::config::{HeaderMode, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::schema::{RawFrame, names_sample_key, normalize_cell};
use csv::{ByteRecord, Reader, ReaderBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Framing options for delimited member files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedOptions {
    pub delimiter: u8,
    pub header: HeaderMode,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            header: HeaderMode::Auto,
        }
    }
}

impl DelimitedOptions {
    #[must_use]
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            delimiter: cfg.delimiter_byte(),
            header: cfg.header,
        }
    }
}

fn decode(record: &ByteRecord) -> Vec<Option<String>> {
    record
        .iter()
        .map(|field| normalize_cell(&String::from_utf8_lossy(field)))
        .collect()
}

/// Streams a delimited file as a sequence of bounded row batches.
///
/// Each call to [`next`](Iterator::next) reads up to `chunk_size` records. The
/// final batch may be smaller; end of input ends the iteration. After an
/// error the iterator is fused.
pub struct ChunkedReader {
    path: PathBuf,
    reader: Reader<File>,
    columns: Vec<String>,
    pending: Option<ByteRecord>,
    chunk_size: usize,
    done: bool,
}

impl ChunkedReader {
    /// Open `path` and resolve its column names.
    ///
    /// `layout` names the columns when the file has no header row.
    ///
    /// # Errors
    /// Returns [`PipelineError::Read`] if the file cannot be opened or its
    /// first record cannot be read.
    pub fn open(
        path: impl AsRef<Path>,
        opts: DelimitedOptions,
        layout: &[&str],
        chunk_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let read_err = |source| PipelineError::Read {
            path: path.clone(),
            source,
        };
        let mut reader = ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_path(&path)
            .map_err(read_err)?;

        let mut first = ByteRecord::new();
        let has_first = reader.read_byte_record(&mut first).map_err(read_err)?;
        let layout_columns = || -> Vec<String> { layout.iter().map(|c| (*c).to_string()).collect() };

        let (columns, pending) = if !has_first {
            (layout_columns(), None)
        } else {
            let fields: Vec<String> = first
                .iter()
                .map(|f| String::from_utf8_lossy(f).trim().to_string())
                .collect();
            let is_header = match opts.header {
                HeaderMode::Present => true,
                HeaderMode::Absent => false,
                HeaderMode::Auto => names_sample_key(fields.iter().map(String::as_str)),
            };
            if is_header {
                (fields, None)
            } else {
                (layout_columns(), Some(first))
            }
        };

        Ok(Self {
            path,
            reader,
            columns,
            pending,
            chunk_size: chunk_size.max(1),
            done: false,
        })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_batch(&mut self) -> Result<Option<RawFrame>> {
        let mut rows = Vec::new();
        if let Some(first) = self.pending.take() {
            rows.push(decode(&first));
        }
        let mut record = ByteRecord::new();
        while rows.len() < self.chunk_size {
            let more = self
                .reader
                .read_byte_record(&mut record)
                .map_err(|source| PipelineError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            if !more {
                self.done = true;
                break;
            }
            rows.push(decode(&record));
        }
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(RawFrame::new(self.columns.clone(), rows)))
    }

    /// Drain the remaining rows into one frame.
    ///
    /// # Errors
    /// Returns the first read error encountered.
    pub fn read_all(mut self) -> Result<RawFrame> {
        let mut rows = Vec::new();
        for batch in &mut self {
            let batch = batch?;
            rows.extend(batch.into_rows());
        }
        Ok(RawFrame::new(self.columns, rows))
    }
}

impl Iterator for ChunkedReader {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done && self.pending.is_none() {
            return None;
        }
        match self.next_batch() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                self.pending = None;
                Some(Err(e))
            }
        }
    }
}

/// Read an entire delimited file into one [`RawFrame`].
///
/// # Errors
/// Returns [`PipelineError::Read`] if the file cannot be opened or read.
pub fn read_frame(
    path: impl AsRef<Path>,
    opts: DelimitedOptions,
    layout: &[&str],
) -> Result<RawFrame> {
    ChunkedReader::open(path, opts, layout, usize::MAX)?.read_all()
}
