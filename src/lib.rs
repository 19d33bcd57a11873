//! # pdp-ingest
//!
//! Batch ingestion of the USDA Pesticide Data Program (PDP) yearly archives
//! into a year-partitioned Parquet dataset.
//!
//! Each yearly archive bundles a samples file and a results file (pipe
//! delimited, with or without a header row, columns varying by year). For every
//! year the pipeline:
//!
//! 1. extracts the archive into a private scratch directory ([`archive`])
//! 2. loads and standardizes the samples table ([`io::delimited`], [`standardize`])
//! 3. streams the results file in bounded chunks, standardizes each chunk,
//!    derives detection flags, and left-joins it against the samples ([`engine`])
//! 4. writes every joined chunk as one `year=<Y>/part-NNNNNN.parquet` file
//!    ([`io::parquet`])
//!
//! Years are independent: a failure in one year is recorded in the
//! [`RunReport`] and never stops the others.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdp_ingest::{PipelineConfig, run};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cfg = PipelineConfig {
//!     input_dir: "data/zipped".into(),
//!     output_dir: "data/parquet".into(),
//!     chunk_size: 100_000,
//!     ..PipelineConfig::default()
//! };
//! let report = run(&cfg)?;
//! report.log_summary();
//! assert_eq!(report.failed(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Reading partitions back
//!
//! ```no_run
//! use pdp_ingest::io::{list_partitions, read_partition};
//!
//! # fn main() -> anyhow::Result<()> {
//! for part in list_partitions("data/parquet", 2019)? {
//!     let rows = read_partition(&part)?;
//!     println!("{}: {} rows", part.display(), rows.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - The `pdp-ingest` binary (clap + tracing-subscriber)
//! - `parallel-years` - Allow years to run concurrently on a rayon pool
//!
//! ## Module Overview
//!
//! - [`archive`] - Zip extraction and samples/results member classification
//! - [`schema`] - Raw frames, canonical column sets, alias resolution
//! - [`standardize`] - Typed records, numeric coercion, detection flags
//! - [`engine`] - Sample table, left join, partition stream
//! - [`io`] - Chunked delimited reader and Parquet partition writer
//! - [`driver`] - Archive discovery and per-year orchestration
//! - [`report`] - Per-year outcomes and the JSON run report
//! - [`config`] - [`PipelineConfig`] and TOML loading
//! - [`testing`] - Archive builders and in-memory sinks for tests

pub mod archive;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod io;
pub mod report;
pub mod schema;
pub mod standardize;
pub mod testing;

#[cfg(feature = "cli")]
pub mod logging;

pub use config::{HeaderMode, OutputCompression, PipelineConfig, YearRange};
pub use driver::{discover_archives, process_archive, resolve_year, run};
pub use engine::{
    JoinedRecord, PartitionSink, PartitionStream, SampleTable, WrittenPartition, YearStats,
    join_chunk, process,
};
pub use error::{ErrorKind, FileRole, PipelineError, Result};
pub use report::{RunReport, SkipReason, YearOutcome, YearStatus};
pub use schema::RawFrame;
pub use standardize::{
    DetectionFlags, ResultRecord, SampleRecord, standardize_results, standardize_samples,
};
