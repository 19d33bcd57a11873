//! Pipeline driver: discover yearly archives and run each year end to end.
//!
//! The driver holds no algorithmic logic. Per archive it resolves a year,
//! extracts into a private scratch directory, loads the samples table,
//! streams the results through the engine into that year's partition
//! directory, and records one [`YearOutcome`]. Any error inside a year is
//! caught here and recorded; it never stops the other years.
//!
//! Years share no mutable state, so with `parallel` set they run on a rayon
//! pool, one year per task. Within a year everything stays sequential.

use crate::archive::{classify, extract};
use crate::config::PipelineConfig;
use crate::engine::{self, SampleTable, YearStats};
use crate::error::{PipelineError, Result};
use crate::io::delimited::{ChunkedReader, DelimitedOptions, read_frame};
use crate::io::parquet::ParquetPartitionWriter;
use crate::report::{RunReport, SkipReason, YearOutcome, YearStatus};
use crate::schema::{RESULTS_LAYOUT, SAMPLES_LAYOUT};
use crate::standardize::standardize_samples;
use glob::glob;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

static YEAR_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])((?:19|20)[0-9]{2})(?:[^0-9]|$)").expect("valid year regex")
});

/// First standalone 4-digit `19xx`/`20xx` token in the archive's file name.
#[must_use]
pub fn resolve_year(archive: &Path) -> Option<i32> {
    let name = archive.file_name()?.to_string_lossy();
    YEAR_TOKEN
        .captures(&name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Archives under `input_dir` matching `archive_pattern`, sorted by path.
///
/// A missing input directory yields no archives.
///
/// # Errors
/// Returns [`PipelineError::Config`] for an invalid pattern and
/// [`PipelineError::Io`] if a matched entry cannot be read.
pub fn discover_archives(cfg: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let pattern = cfg.input_dir.join(&cfg.archive_pattern);
    let pattern = pattern.to_string_lossy();
    let paths = glob(&pattern)
        .map_err(|e| PipelineError::Config(format!("invalid archive pattern {pattern}: {e}")))?;

    let mut out = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            PipelineError::io(path, e.into_error())
        })?;
        if path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Run one year: extract, load samples, stream-join-partition results.
///
/// # Errors
/// Returns the first archive, schema, read, or write error for this year.
pub fn process_archive(cfg: &PipelineConfig, year: i32, archive: &Path) -> Result<YearStats> {
    let work_root = cfg.work_root();
    std::fs::create_dir_all(&work_root).map_err(|e| PipelineError::io(&work_root, e))?;
    let scratch = tempfile::Builder::new()
        .prefix(&format!("pdp-{year}-"))
        .tempdir_in(&work_root)
        .map_err(|e| PipelineError::io(&work_root, e))?;

    let files = extract(archive, scratch.path())?;
    let members = classify(&files, archive)?;
    debug!(samples = %members.samples.display(), results = %members.results.display(), "members");

    let opts = DelimitedOptions::from_config(cfg);
    let samples = standardize_samples(&read_frame(&members.samples, opts, SAMPLES_LAYOUT)?);
    if samples.missing_key > 0 {
        warn!(rows = samples.missing_key, "dropped sample rows without a sample key");
    }
    let sample_warnings = samples.warnings.len();
    let table = SampleTable::new(samples.records);
    if table.duplicate_keys() > 0 {
        warn!(
            duplicates = table.duplicate_keys(),
            "duplicate sample keys; first occurrence kept"
        );
    }
    info!(samples = table.len(), "samples loaded");

    let chunks = ChunkedReader::open(&members.results, opts, RESULTS_LAYOUT, cfg.chunk_size)?;
    let sink =
        ParquetPartitionWriter::create(&cfg.output_dir, year, cfg.compression, cfg.overwrite)?;
    let mut stats = engine::process(year, &table, chunks, sink).run()?;
    stats.parse_warnings += sample_warnings;

    if let Err(e) = scratch.close() {
        warn!(error = %e, "could not remove scratch directory");
    }
    Ok(stats)
}

fn run_year(cfg: &PipelineConfig, year: i32, archive: &Path) -> YearOutcome {
    let _span = info_span!("year", year).entered();
    info!(archive = %archive.display(), "processing");
    let status = match process_archive(cfg, year, archive) {
        Ok(stats) => YearStatus::Processed(stats),
        Err(e) => {
            error!(error = %e, "year failed");
            YearStatus::failed(&e)
        }
    };
    YearOutcome {
        year: Some(year),
        archive: Some(archive.to_path_buf()),
        status,
    }
}

fn skipped(year: Option<i32>, archive: Option<&Path>, reason: SkipReason) -> YearOutcome {
    YearOutcome {
        year,
        archive: archive.map(Path::to_path_buf),
        status: YearStatus::Skipped { reason },
    }
}

fn run_jobs(cfg: &PipelineConfig, jobs: &[(i32, PathBuf)]) -> Vec<YearOutcome> {
    #[cfg(feature = "parallel-years")]
    {
        if cfg.parallel && jobs.len() > 1 {
            use rayon::prelude::*;
            match rayon::ThreadPoolBuilder::new()
                .num_threads(cfg.worker_threads())
                .build()
            {
                Ok(pool) => {
                    return pool.install(|| {
                        jobs.par_iter()
                            .map(|(year, archive)| run_year(cfg, *year, archive))
                            .collect()
                    });
                }
                Err(e) => {
                    warn!(error = %e, "thread pool unavailable; processing years sequentially");
                }
            }
        }
    }
    jobs.iter()
        .map(|(year, archive)| run_year(cfg, *year, archive))
        .collect()
}

/// Process every discovered archive and report per-year outcomes.
///
/// # Errors
/// Only configuration and discovery problems are returned as errors; every
/// per-year failure is recorded in the report instead.
pub fn run(cfg: &PipelineConfig) -> Result<RunReport> {
    cfg.validate()?;
    let started = Instant::now();
    let archives = discover_archives(cfg)?;
    info!(
        archives = archives.len(),
        input = %cfg.input_dir.display(),
        "discovered archives"
    );

    let mut outcomes = Vec::new();
    let mut claimed: BTreeMap<i32, PathBuf> = BTreeMap::new();
    for archive in archives {
        let Some(year) = resolve_year(&archive) else {
            warn!(archive = %archive.display(), "no year in archive name; skipped");
            outcomes.push(skipped(None, Some(&archive), SkipReason::NoYear));
            continue;
        };
        if cfg.expected_years.is_some_and(|r| !r.contains(year)) {
            debug!(year, archive = %archive.display(), "outside expected years; skipped");
            outcomes.push(skipped(Some(year), Some(&archive), SkipReason::OutsideRange));
            continue;
        }
        if let Some(first) = claimed.get(&year) {
            warn!(
                year,
                archive = %archive.display(),
                kept = %first.display(),
                "second archive for the same year; skipped"
            );
            outcomes.push(skipped(Some(year), Some(&archive), SkipReason::DuplicateYear));
            continue;
        }
        claimed.insert(year, archive);
    }

    if let Some(range) = cfg.expected_years {
        for year in range.iter().filter(|y| !claimed.contains_key(y)) {
            warn!(year, "no archive found");
            outcomes.push(skipped(Some(year), None, SkipReason::NoArchive));
        }
    }

    let jobs: Vec<(i32, PathBuf)> = claimed.into_iter().collect();
    outcomes.extend(run_jobs(cfg, &jobs));
    Ok(RunReport::new(outcomes, started.elapsed()))
}
