//! Assertion functions for joined output.

use crate::engine::{JoinedRecord, WrittenPartition};
use std::fmt::Debug;

/// Assert that two slices are equal in order and content.
///
/// # Panics
///
/// Panics if the slices differ in length or content.
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a, e, "Collection mismatch at index {i}");
    }
}

/// Assert the detection flag invariants on every row.
///
/// Exactly one of `is_detect` / `is_non_detect` holds, and a known
/// `above_tolerance == Some(true)` implies a detection.
///
/// # Panics
///
/// Panics naming the first offending row.
pub fn assert_flag_invariants<'a>(rows: impl IntoIterator<Item = &'a JoinedRecord>) {
    for (i, r) in rows.into_iter().enumerate() {
        assert!(
            r.is_detect ^ r.is_non_detect,
            "row {i} ({:?}): is_detect={} is_non_detect={}",
            r.sample_key,
            r.is_detect,
            r.is_non_detect
        );
        if r.above_tolerance == Some(true) {
            assert!(r.is_detect, "row {i} ({:?}): above tolerance without a detection", r.sample_key);
        }
    }
}

/// Assert that partition numbers are `0, 1, 2, ...` with no gaps.
///
/// # Panics
///
/// Panics if any partition is out of sequence.
pub fn assert_contiguous(seqs: &[usize]) {
    for (expected, actual) in seqs.iter().enumerate() {
        assert_eq!(*actual, expected, "partition numbers not contiguous: {seqs:?}");
    }
}

/// [`assert_contiguous`] over written partitions.
///
/// # Panics
///
/// Panics if any partition is out of sequence.
pub fn assert_contiguous_partitions(written: &[WrittenPartition]) {
    let seqs: Vec<usize> = written.iter().map(|w| w.seq).collect();
    assert_contiguous(&seqs);
}
