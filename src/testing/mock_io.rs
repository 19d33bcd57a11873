//! Mock I/O helpers: temp directories, archive builders, in-memory sinks.

use crate::engine::{JoinedRecord, PartitionSink, WrittenPartition};
use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A temporary directory that is deleted when dropped.
pub struct TempDirPath {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path inside this directory.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }
}

/// Builds a yearly zip archive from in-memory member texts.
///
/// # Example
///
/// ```
/// use pdp_ingest::testing::{ArchiveBuilder, TempDirPath, SAMPLES_HEADERED, RESULTS_HEADERED};
///
/// let dir = TempDirPath::new().unwrap();
/// let path = ArchiveBuilder::new()
///     .directory("docs/")
///     .file("PDP2019Samples.txt", SAMPLES_HEADERED)
///     .file("PDP2019Results.txt", RESULTS_HEADERED)
///     .write(dir.file_path("PDP2019.zip"))
///     .unwrap();
/// assert!(path.exists());
/// ```
#[derive(Debug, Default, Clone)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Option<Vec<u8>>)>,
}

impl ArchiveBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file member.
    #[must_use]
    pub fn file(mut self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.entries
            .push((name.to_string(), Some(contents.as_ref().to_vec())));
        self
    }

    /// Add a directory entry.
    #[must_use]
    pub fn directory(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), None));
        self
    }

    /// Write the archive to `path` (deflate-compressed members).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write(self, path: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let path = path.as_ref().to_path_buf();
        let mut zip = ZipWriter::new(File::create(&path)?);
        let options = SimpleFileOptions::default();
        for (name, contents) in self.entries {
            match contents {
                Some(bytes) => {
                    zip.start_file(name, options)?;
                    zip.write_all(&bytes)?;
                }
                None => zip.add_directory(name, options)?,
            }
        }
        zip.finish()?;
        Ok(path)
    }
}

/// Write a yearly archive holding `samples.txt` and `results.txt`.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn write_year_archive(
    dir: impl AsRef<Path>,
    file_name: &str,
    samples: &str,
    results: &str,
) -> std::io::Result<PathBuf> {
    ArchiveBuilder::new()
        .file("samples.txt", samples)
        .file("results.txt", results)
        .write(dir.as_ref().join(file_name))
}

/// Write bytes that are not a zip archive under `file_name`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_corrupt_archive(dir: impl AsRef<Path>, file_name: &str) -> std::io::Result<PathBuf> {
    let path = dir.as_ref().join(file_name);
    std::fs::write(&path, b"PK\x03\x04 truncated, not really a zip")?;
    Ok(path)
}

/// Write a plain text file and return its path.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_text(dir: impl AsRef<Path>, file_name: &str, text: &str) -> std::io::Result<PathBuf> {
    let path = dir.as_ref().join(file_name);
    std::fs::write(&path, text)?;
    Ok(path)
}

/// A [`PartitionSink`] that keeps partitions in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub partitions: Vec<(usize, Vec<JoinedRecord>)>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn seqs(&self) -> Vec<usize> {
        self.partitions.iter().map(|(seq, _)| *seq).collect()
    }

    /// All captured rows in partition order.
    #[must_use]
    pub fn rows(&self) -> Vec<&JoinedRecord> {
        self.partitions.iter().flat_map(|(_, rows)| rows).collect()
    }
}

impl PartitionSink for MemorySink {
    fn write_partition(&mut self, seq: usize, rows: &[JoinedRecord]) -> Result<WrittenPartition> {
        self.partitions.push((seq, rows.to_vec()));
        Ok(WrittenPartition {
            seq,
            path: PathBuf::from(format!("memory://{seq}")),
            rows: rows.len(),
        })
    }
}
