//! Archive reader: extract a yearly bundle and find its samples/results files.
//!
//! Extraction materializes every file member under a scratch directory chosen
//! by the caller; directory entries are skipped. Members whose names would
//! escape the scratch directory (absolute paths, `..`) are skipped with a
//! warning. The reader never deletes what it wrote; the scratch directory's
//! owner does.
//!
//! Classification looks at the member's file name, case-insensitively:
//! a name containing `result` is a results candidate, otherwise a name
//! containing `sample` is a samples candidate. When a role has several
//! candidates, delimited-text extensions are preferred, then the first name in
//! sorted order.

use crate::error::{FileRole, PipelineError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

const DATA_EXTENSIONS: &[&str] = &["txt", "csv", "dat", "psv"];

/// One member file materialized on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    /// Name of the member inside the archive.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
}

impl ExtractedFile {
    fn file_name_lower(&self) -> String {
        Path::new(&self.name)
            .file_name()
            .map_or_else(|| self.name.clone(), |n| n.to_string_lossy().into_owned())
            .to_lowercase()
    }

    fn has_data_extension(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| DATA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
    }
}

/// The two member files a year needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMembers {
    pub samples: PathBuf,
    pub results: PathBuf,
}

/// Extract every file member of `archive` into `dest`.
///
/// # Errors
/// Returns [`PipelineError::Archive`] if the archive cannot be opened or a
/// member is corrupt, and [`PipelineError::Io`] if writing fails.
pub fn extract(archive: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<Vec<ExtractedFile>> {
    let archive = archive.as_ref();
    let dest = dest.as_ref();
    let zip_err = |source| PipelineError::Archive {
        path: archive.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(|e| PipelineError::io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(zip_err)?;
    let mut out = Vec::with_capacity(zip.len());

    for i in 0..zip.len() {
        let mut member = zip.by_index(i).map_err(zip_err)?;
        if member.is_dir() {
            continue;
        }
        let name = member.name().to_string();
        let Some(relative) = member.enclosed_name() else {
            warn!(archive = %archive.display(), member = %name, "skipping member with unsafe path");
            continue;
        };
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let mut writer = File::create(&target).map_err(|e| PipelineError::io(&target, e))?;
        io::copy(&mut member, &mut writer).map_err(|e| {
            // A failed inflate surfaces as an I/O error from the member reader.
            if e.kind() == io::ErrorKind::InvalidData {
                zip_err(zip::result::ZipError::Io(e))
            } else {
                PipelineError::io(&target, e)
            }
        })?;
        debug!(member = %name, path = %target.display(), "extracted");
        out.push(ExtractedFile { name, path: target });
    }
    Ok(out)
}

fn pick(mut candidates: Vec<&ExtractedFile>, role: FileRole) -> Option<PathBuf> {
    candidates.sort_by(|a, b| {
        b.has_data_extension()
            .cmp(&a.has_data_extension())
            .then_with(|| a.name.cmp(&b.name))
    });
    if candidates.len() > 1 {
        warn!(
            %role,
            chosen = %candidates[0].name,
            candidates = candidates.len(),
            "several archive members match; using the first"
        );
    }
    candidates.first().map(|f| f.path.clone())
}

/// Assign the samples and results roles among extracted members.
///
/// # Errors
/// Returns [`PipelineError::MissingFile`] naming the first unmatched role.
pub fn classify(files: &[ExtractedFile], archive: impl AsRef<Path>) -> Result<ArchiveMembers> {
    let mut samples = Vec::new();
    let mut results = Vec::new();
    for f in files {
        let name = f.file_name_lower();
        if name.contains("result") {
            results.push(f);
        } else if name.contains("sample") {
            samples.push(f);
        }
    }

    let missing = |role| PipelineError::MissingFile {
        archive: archive.as_ref().to_path_buf(),
        role,
    };
    let samples = pick(samples, FileRole::Samples).ok_or_else(|| missing(FileRole::Samples))?;
    let results = pick(results, FileRole::Results).ok_or_else(|| missing(FileRole::Results))?;
    Ok(ArchiveMembers { samples, results })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> ExtractedFile {
        ExtractedFile {
            name: name.to_string(),
            path: PathBuf::from("/scratch").join(name),
        }
    }

    #[test]
    fn classifies_case_insensitively() {
        let files = vec![file("PDP2019SAMPLES.TXT"), file("pdp2019Results.txt")];
        let members = classify(&files, "2019.zip").unwrap();
        assert!(members.samples.ends_with("PDP2019SAMPLES.TXT"));
        assert!(members.results.ends_with("pdp2019Results.txt"));
    }

    #[test]
    fn prefers_text_members_over_documents() {
        let files = vec![
            file("Sample Data Dictionary.pdf"),
            file("samples.txt"),
            file("results.txt"),
        ];
        let members = classify(&files, "x.zip").unwrap();
        assert!(members.samples.ends_with("samples.txt"));
    }

    #[test]
    fn missing_results_is_a_schema_error() {
        let files = vec![file("samples.txt"), file("readme.txt")];
        let err = classify(&files, "x.zip").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingFile {
                role: FileRole::Results,
                ..
            }
        ));
    }
}
