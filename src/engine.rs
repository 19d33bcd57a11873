//! Join-and-partition engine.
//!
//! A year is processed as a strictly sequential loop over bounded batches of
//! raw result rows:
//!
//! 1. pull the next batch from the chunked source,
//! 2. standardize it into [`ResultRecord`]s,
//! 3. left-join every record against the in-memory [`SampleTable`],
//! 4. stamp the year,
//! 5. hand the rows to a [`PartitionSink`] under the next sequence number.
//!
//! [`PartitionStream`] drives this loop lazily: each call to `next` performs
//! exactly one iteration and returns only after the partition is written, so at
//! most one batch of result rows is alive at a time. Sequence numbers start at
//! 0 and are only consumed by batches that actually hold rows.

use crate::error::Result;
use crate::schema::RawFrame;
use crate::standardize::{ResultRecord, SampleRecord, standardize_results};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A result row with its sample's attributes appended and the year stamped.
///
/// For the columns both sides carry (`commod`, `commtype`) the sample value
/// wins whenever a sample matched; unmatched rows keep the result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub year: i32,
    pub sample_key: Option<String>,
    pub commod: Option<String>,
    pub commtype: Option<String>,
    pub lab: Option<String>,
    pub pestcode: Option<String>,
    pub pestname: Option<String>,
    pub testclass: Option<String>,
    pub concen: Option<f64>,
    pub lod: Option<f64>,
    pub conunit: Option<String>,
    pub confmethod: Option<String>,
    pub confmethod2: Option<String>,
    pub annotate: Option<String>,
    pub quantitate: Option<String>,
    pub mean: Option<String>,
    pub extract: Option<String>,
    pub determin: Option<String>,
    pub epa_tolerance: Option<f64>,
    pub tolerance_unit: Option<String>,
    pub is_non_detect: bool,
    pub is_detect: bool,
    pub above_tolerance: Option<bool>,
    pub sample_matched: bool,
    pub state: Option<String>,
    pub origin: Option<String>,
    pub country: Option<String>,
    pub claim: Option<String>,
    pub variety: Option<String>,
    pub site: Option<String>,
    pub source_id: Option<String>,
    pub disttype: Option<String>,
    pub quantity: Option<String>,
    pub growst: Option<String>,
    pub packst: Option<String>,
    pub distst: Option<String>,
    pub sample_date: Option<NaiveDate>,
}

impl JoinedRecord {
    #[must_use]
    pub fn join(year: i32, result: ResultRecord, sample: Option<&SampleRecord>) -> Self {
        let ResultRecord {
            sample_key,
            commod,
            commtype,
            lab,
            pestcode,
            pestname,
            testclass,
            concen,
            lod,
            conunit,
            confmethod,
            confmethod2,
            annotate,
            quantitate,
            mean,
            extract,
            determin,
            epa_tolerance,
            tolerance_unit,
            is_non_detect,
            is_detect,
            above_tolerance,
        } = result;

        let side = |f: fn(&SampleRecord) -> &Option<String>| sample.and_then(|s| f(s).clone());
        let (commod, commtype) = match sample {
            Some(s) => (s.commod.clone(), s.commtype.clone()),
            None => (commod, commtype),
        };

        Self {
            year,
            sample_key,
            commod,
            commtype,
            lab,
            pestcode,
            pestname,
            testclass,
            concen,
            lod,
            conunit,
            confmethod,
            confmethod2,
            annotate,
            quantitate,
            mean,
            extract,
            determin,
            epa_tolerance,
            tolerance_unit,
            is_non_detect,
            is_detect,
            above_tolerance,
            sample_matched: sample.is_some(),
            state: side(|s| &s.state),
            origin: side(|s| &s.origin),
            country: side(|s| &s.country),
            claim: side(|s| &s.claim),
            variety: side(|s| &s.variety),
            site: side(|s| &s.site),
            source_id: side(|s| &s.source_id),
            disttype: side(|s| &s.disttype),
            quantity: side(|s| &s.quantity),
            growst: side(|s| &s.growst),
            packst: side(|s| &s.packst),
            distst: side(|s| &s.distst),
            sample_date: sample.and_then(|s| s.sample_date),
        }
    }
}

/// One year's samples, indexed by key.
///
/// Duplicate keys are tolerated: the first record seen for a key is the one
/// every lookup returns; later duplicates are counted and otherwise ignored.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    records: Vec<SampleRecord>,
    index: HashMap<String, usize>,
    duplicate_keys: usize,
}

impl SampleTable {
    #[must_use]
    pub fn new(records: Vec<SampleRecord>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        let mut duplicate_keys = 0;
        for (i, rec) in records.iter().enumerate() {
            if index.contains_key(&rec.sample_key) {
                duplicate_keys += 1;
            } else {
                index.insert(rec.sample_key.clone(), i);
            }
        }
        Self {
            records,
            index,
            duplicate_keys,
        }
    }

    #[must_use]
    pub fn get(&self, sample_key: &str) -> Option<&SampleRecord> {
        self.index.get(sample_key).map(|&i| &self.records[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records whose key had already been seen.
    #[must_use]
    pub fn duplicate_keys(&self) -> usize {
        self.duplicate_keys
    }
}

/// Left-join a batch of results to `samples` and stamp `year`.
///
/// Output has exactly one row per input row, in input order.
#[must_use]
pub fn join_chunk(
    year: i32,
    samples: &SampleTable,
    results: Vec<ResultRecord>,
) -> Vec<JoinedRecord> {
    results
        .into_iter()
        .map(|r| {
            let sample = r.sample_key.as_deref().and_then(|k| samples.get(k));
            JoinedRecord::join(year, r, sample)
        })
        .collect()
}

/// A persisted partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenPartition {
    pub seq: usize,
    pub path: PathBuf,
    pub rows: usize,
}

/// Destination for one year's partitions.
///
/// Implementations must make partition `seq` durable before returning; the
/// engine never calls `write_partition` twice with the same `seq` and never
/// passes an empty slice.
pub trait PartitionSink {
    fn write_partition(&mut self, seq: usize, rows: &[JoinedRecord]) -> Result<WrittenPartition>;
}

impl<S: PartitionSink + ?Sized> PartitionSink for &mut S {
    fn write_partition(&mut self, seq: usize, rows: &[JoinedRecord]) -> Result<WrittenPartition> {
        (**self).write_partition(seq, rows)
    }
}

/// Running totals for one year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearStats {
    pub samples: usize,
    pub partitions: usize,
    pub rows: usize,
    pub unmatched_rows: usize,
    pub rows_missing_key: usize,
    pub parse_warnings: usize,
    pub duplicate_sample_keys: usize,
}

const LOGGED_WARNINGS_PER_CHUNK: usize = 5;

/// Lazy sequence of written partitions for one year.
///
/// Construct with [`process`]. Iteration stops at the end of the source or
/// after the first error; partitions written before an error stay in place.
pub struct PartitionStream<'a, I, S> {
    year: i32,
    samples: &'a SampleTable,
    chunks: I,
    sink: S,
    next_seq: usize,
    stats: YearStats,
    failed: bool,
}

/// Start processing one year's result stream.
///
/// Nothing is read or written until the returned stream is polled.
pub fn process<I, S>(
    year: i32,
    samples: &SampleTable,
    chunks: I,
    sink: S,
) -> PartitionStream<'_, I::IntoIter, S>
where
    I: IntoIterator<Item = Result<RawFrame>>,
    S: PartitionSink,
{
    PartitionStream {
        year,
        samples,
        chunks: chunks.into_iter(),
        sink,
        next_seq: 0,
        stats: YearStats {
            samples: samples.len(),
            duplicate_sample_keys: samples.duplicate_keys(),
            ..YearStats::default()
        },
        failed: false,
    }
}

impl<I, S> PartitionStream<'_, I, S>
where
    I: Iterator<Item = Result<RawFrame>>,
    S: PartitionSink,
{
    #[must_use]
    pub fn stats(&self) -> YearStats {
        self.stats
    }

    /// Drive the stream to completion and return the year's totals.
    ///
    /// # Errors
    /// Returns the first read, encode, or write error.
    pub fn run(mut self) -> Result<YearStats> {
        for written in &mut self {
            written?;
        }
        Ok(self.stats)
    }

    fn step(&mut self, frame: RawFrame) -> Result<Option<WrittenPartition>> {
        let batch = standardize_results(&frame);
        drop(frame);

        self.stats.parse_warnings += batch.warnings.len();
        self.stats.rows_missing_key += batch.missing_key;
        for w in batch.warnings.iter().take(LOGGED_WARNINGS_PER_CHUNK) {
            debug!(year = self.year, seq = self.next_seq, %w, "parse warning");
        }
        if batch.missing_key > 0 {
            warn!(
                year = self.year,
                rows = batch.missing_key,
                "result rows without a sample key; kept unmatched"
            );
        }
        if batch.records.is_empty() {
            debug!(year = self.year, "empty batch; skipped");
            return Ok(None);
        }

        let joined = join_chunk(self.year, self.samples, batch.records);
        let unmatched = joined.iter().filter(|r| !r.sample_matched).count();
        let written = self.sink.write_partition(self.next_seq, &joined)?;

        self.next_seq += 1;
        self.stats.partitions += 1;
        self.stats.rows += joined.len();
        self.stats.unmatched_rows += unmatched;
        debug!(
            year = self.year,
            seq = written.seq,
            rows = written.rows,
            unmatched,
            path = %written.path.display(),
            "partition written"
        );
        Ok(Some(written))
    }
}

impl<I, S> Iterator for PartitionStream<'_, I, S>
where
    I: Iterator<Item = Result<RawFrame>>,
    S: PartitionSink,
{
    type Item = Result<WrittenPartition>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let frame = match self.chunks.next()? {
                Ok(frame) => frame,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            match self.step(frame) {
                Ok(Some(written)) => return Some(Ok(written)),
                Ok(None) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
