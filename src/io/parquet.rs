//! Parquet partition output powered by Serde + Arrow + Parquet.
//!
//! This module provides:
//! - [`joined_schema`]: the fixed Arrow schema of every partition, independent
//!   of which columns a given year's input carried
//! - [`ParquetPartitionWriter`]: a [`PartitionSink`] that writes one
//!   `year=<Y>/part-NNNNNN.parquet` file per partition
//! - [`read_partition`] / [`read_parquet_vec`] to load partitions back
//!
//! Rows are converted with `serde_arrow::to_record_batch` against the explicit
//! schema and written with `parquet::arrow::ArrowWriter`. Each file is written
//! under a `.tmp` name, fsynced, and renamed into place, so a partition either
//! exists completely or not at all.

use crate::config::OutputCompression;
use crate::engine::{JoinedRecord, PartitionSink, WrittenPartition};
use crate::error::{PipelineError, Result};
use arrow::datatypes::{DataType, Field, FieldRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::de::DeserializeOwned;
use serde_arrow::{from_record_batch, to_record_batch};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

const TEXT_COLUMNS_RESULT: &[&str] = &[
    "commod",
    "commtype",
    "lab",
    "pestcode",
    "pestname",
    "testclass",
];

const TEXT_COLUMNS_RESULT_TAIL: &[&str] = &[
    "conunit",
    "confmethod",
    "confmethod2",
    "annotate",
    "quantitate",
    "mean",
    "extract",
    "determin",
];

const TEXT_COLUMNS_SAMPLE: &[&str] = &[
    "state", "origin", "country", "claim", "variety", "site", "source_id", "disttype",
    "quantity", "growst", "packst", "distst",
];

/// Arrow schema of a written partition, in [`JoinedRecord`] field order.
#[must_use]
pub fn joined_schema() -> Vec<FieldRef> {
    let text = |name: &str| Arc::new(Field::new(name, DataType::LargeUtf8, true));
    let float = |name: &str| Arc::new(Field::new(name, DataType::Float64, true));

    let mut fields: Vec<FieldRef> = vec![
        Arc::new(Field::new("year", DataType::Int32, false)),
        Arc::new(Field::new("sample_key", DataType::LargeUtf8, true)),
    ];
    fields.extend(TEXT_COLUMNS_RESULT.iter().copied().map(text));
    fields.push(float("concen"));
    fields.push(float("lod"));
    fields.extend(TEXT_COLUMNS_RESULT_TAIL.iter().copied().map(text));
    fields.push(float("epa_tolerance"));
    fields.push(text("tolerance_unit"));
    fields.push(Arc::new(Field::new("is_non_detect", DataType::Boolean, false)));
    fields.push(Arc::new(Field::new("is_detect", DataType::Boolean, false)));
    fields.push(Arc::new(Field::new("above_tolerance", DataType::Boolean, true)));
    fields.push(Arc::new(Field::new("sample_matched", DataType::Boolean, false)));
    fields.extend(TEXT_COLUMNS_SAMPLE.iter().copied().map(text));
    fields.push(Arc::new(Field::new("sample_date", DataType::Date32, true)));
    fields
}

/// File name of partition `seq` within its year directory.
#[must_use]
pub fn partition_file_name(seq: usize) -> String {
    format!("part-{seq:06}.parquet")
}

/// Directory holding one year's partitions under `output_root`.
#[must_use]
pub fn year_dir(output_root: &Path, year: i32) -> PathBuf {
    output_root.join(format!("year={year}"))
}

/// Writes joined partitions for one year as Parquet files.
///
/// Owns the year's output namespace: creation fails with
/// [`PipelineError::OutputExists`] when the directory already holds files,
/// unless `overwrite` is set, in which case the directory is cleared first.
pub struct ParquetPartitionWriter {
    dir: PathBuf,
    fields: Vec<FieldRef>,
    props: WriterProperties,
}

impl ParquetPartitionWriter {
    /// Prepare `output_root/year=<year>/` for writing.
    ///
    /// # Errors
    /// Returns [`PipelineError::OutputExists`] or [`PipelineError::Io`].
    pub fn create(
        output_root: impl AsRef<Path>,
        year: i32,
        compression: OutputCompression,
        overwrite: bool,
    ) -> Result<Self> {
        let dir = year_dir(output_root.as_ref(), year);
        if dir.exists() {
            let occupied = fs::read_dir(&dir)
                .map_err(|e| PipelineError::io(&dir, e))?
                .next()
                .is_some();
            if occupied {
                if !overwrite {
                    return Err(PipelineError::OutputExists(dir));
                }
                fs::remove_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
            }
        }
        fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;

        let props = WriterProperties::builder()
            .set_compression(compression.to_parquet())
            .build();
        Ok(Self {
            dir,
            fields: joined_schema(),
            props,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ParquetPartitionWriter {
    fn write_file(&self, tmp: &Path, path: &Path, batch: &RecordBatch) -> Result<()> {
        let parquet_err = |source| PipelineError::Parquet {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(tmp).map_err(|e| PipelineError::io(tmp, e))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(self.props.clone()))
            .map_err(parquet_err)?;
        writer.write(batch).map_err(parquet_err)?;
        let file = writer.into_inner().map_err(parquet_err)?;
        file.sync_all().map_err(|e| PipelineError::io(tmp, e))?;
        drop(file);
        fs::rename(tmp, path).map_err(|e| PipelineError::io(path, e))
    }
}

impl PartitionSink for ParquetPartitionWriter {
    fn write_partition(&mut self, seq: usize, rows: &[JoinedRecord]) -> Result<WrittenPartition> {
        let path = self.dir.join(partition_file_name(seq));
        let tmp = path.with_extension("parquet.tmp");

        let batch: RecordBatch =
            to_record_batch(&self.fields, &rows).map_err(|source| PipelineError::Encode {
                path: path.clone(),
                source,
            })?;

        if let Err(e) = self.write_file(&tmp, &path, &batch) {
            // leave no partial file behind
            if tmp.exists()
                && let Err(rm) = fs::remove_file(&tmp)
            {
                warn!(path = %tmp.display(), error = %rm, "could not remove partial partition");
            }
            return Err(e);
        }

        Ok(WrittenPartition {
            seq,
            path,
            rows: rows.len(),
        })
    }
}

/// Read a Parquet file into a typed `Vec<T>`.
///
/// Iterates Arrow batches with `ParquetRecordBatchReaderBuilder` and converts
/// each with `serde_arrow::from_record_batch`.
///
/// # Errors
/// Returns [`PipelineError::Io`] if the file cannot be opened,
/// [`PipelineError::Parquet`] if it cannot be decoded, or
/// [`PipelineError::Encode`] if rows do not fit `T`.
pub fn read_parquet_vec<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let parquet_err = |source| PipelineError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(parquet_err)?
        .with_batch_size(64 * 1024)
        .build()
        .map_err(parquet_err)?;

    let mut out: Vec<T> = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| parquet_err(e.into()))?;
        let mut rows: Vec<T> = from_record_batch(&batch).map_err(|source| PipelineError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        out.append(&mut rows);
    }
    Ok(out)
}

/// Load one written partition.
///
/// # Errors
/// See [`read_parquet_vec`].
pub fn read_partition(path: impl AsRef<Path>) -> Result<Vec<JoinedRecord>> {
    read_parquet_vec(path)
}

/// Partition files of one year in sequence order.
///
/// # Errors
/// Returns [`PipelineError::Io`] if the directory cannot be listed.
pub fn list_partitions(output_root: impl AsRef<Path>, year: i32) -> Result<Vec<PathBuf>> {
    let dir = year_dir(output_root.as_ref(), year);
    let mut parts = Vec::new();
    for entry in fs::read_dir(&dir).map_err(|e| PipelineError::io(&dir, e))? {
        let path = entry.map_err(|e| PipelineError::io(&dir, e))?.path();
        let is_part = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("part-") && n.ends_with(".parquet"));
        if is_part {
            parts.push(path);
        }
    }
    parts.sort();
    Ok(parts)
}
