//! Testing utilities for ingest runs.
//!
//! Helpers for writing tests against the pipeline without real PDP archives:
//!
//! - **Fixtures**: small samples/results texts in both headered and headerless
//!   layouts, including the canonical two-row join scenario
//! - **Mock I/O**: build yearly zip archives in a temp directory, and an
//!   in-memory [`MemorySink`] that captures partitions instead of writing Parquet
//! - **Assertions**: invariant checks over joined rows
//!
//! # Quick Start
//!
//! ```no_run
//! use pdp_ingest::testing::*;
//! use pdp_ingest::{PipelineConfig, run};
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = TempDirPath::new()?;
//! ArchiveBuilder::new()
//!     .file("samples.txt", SAMPLES_HEADERED)
//!     .file("results.txt", RESULTS_HEADERED)
//!     .write(dir.file_path("pdp2019.zip"))?;
//!
//! let cfg = PipelineConfig {
//!     input_dir: dir.path().to_path_buf(),
//!     output_dir: dir.file_path("out"),
//!     ..PipelineConfig::default()
//! };
//! let report = run(&cfg)?;
//! assert_eq!(report.processed(), 1);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_io;

pub use assertions::*;
pub use fixtures::*;
pub use mock_io::*;
