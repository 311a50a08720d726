//! Lookup structures over one version of an exception sequence.
//!
//! The engine never walks the raw sequence to find matches; it consults
//! four indices built in a single scan:
//!
//! - type string → records with that type
//! - value string → records matching by exact or annotation-stripped value
//! - trace content → records with byte-identical traces
//! - trailing-frame-run digest → every (record, frame) pair opening that run
//!
//! Indices hold positions into the sequence they were built from. Any
//! structural change to the sequence (a record or frame removed)
//! invalidates them; the engine rebuilds from scratch after every
//! materialization.

use std::collections::HashMap;

use crate::hash::{trace_key, SuffixHasher, TraceDigest, TraceKey};
use crate::record::ExceptionRecord;

/// Position of one frame within one record of the current sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameRef {
    pub(crate) record: usize,
    pub(crate) frame: usize,
}

/// The value with its trailing call-site annotation stripped.
///
/// Returns the substring before the last occurrence of `" ("`; a value
/// without the marker is returned unchanged. Nested annotations strip one
/// layer only, so `"v (exit code: 1) (f:123)"` stems to
/// `"v (exit code: 1)"`.
pub(crate) fn value_stem(value: &str) -> &str {
    match value.rfind(" (") {
        Some(i) => &value[..i],
        None => value,
    }
}

/// The four lookup structures for one version of a record sequence.
#[derive(Debug, Default)]
pub(crate) struct RecordIndices {
    /// type string → records with exactly that type, ascending.
    pub(crate) by_type: HashMap<String, Vec<usize>>,
    /// value string → records whose exact or annotation-stripped value
    /// equals the key, in scan order. A value with no annotation keys
    /// itself twice; the engine's membership checks tolerate duplicates.
    pub(crate) by_value: HashMap<String, Vec<usize>>,
    /// Trace content → records with byte-identical traces; absent and
    /// empty traces share [`TraceKey::Absent`].
    pub(crate) by_trace: HashMap<TraceKey, Vec<usize>>,
    /// Digest of a trailing frame run → every (record, frame) pair
    /// opening that run, in scan order (ascending record, then suffix
    /// lengths 1..=len within a record).
    pub(crate) by_suffix: HashMap<TraceDigest, Vec<FrameRef>>,
}

impl RecordIndices {
    /// Scan the sequence once and build all four indices.
    pub(crate) fn build(records: &[ExceptionRecord]) -> Self {
        let mut indices = Self::default();

        for (i, record) in records.iter().enumerate() {
            indices
                .by_type
                .entry(record.ty.clone())
                .or_default()
                .push(i);
            indices
                .by_value
                .entry(record.value.clone())
                .or_default()
                .push(i);
            indices
                .by_value
                .entry(value_stem(&record.value).to_string())
                .or_default()
                .push(i);

            indices
                .by_trace
                .entry(trace_key(record.stacktrace.as_ref()))
                .or_default()
                .push(i);

            if let Some(trace) = &record.stacktrace {
                if !trace.frames.is_empty() {
                    let mut suffix = SuffixHasher::new();
                    for frame in (0..trace.frames.len()).rev() {
                        let digest = suffix.extend(&trace.frames[frame]);
                        indices
                            .by_suffix
                            .entry(digest)
                            .or_default()
                            .push(FrameRef { record: i, frame });
                    }
                }
            }
        }

        log::trace!(
            "indexed {} records: {} types, {} values, {} trace buckets, {} suffix buckets",
            records.len(),
            indices.by_type.len(),
            indices.by_value.len(),
            indices.by_trace.len(),
            indices.by_suffix.len(),
        );

        indices
    }

    /// Trace buckets in deterministic processing order: the sentinel
    /// bucket first, then content buckets by first appearance in the
    /// scan. Members within a bucket are already ascending, so the
    /// latest-indexed member of a tie is decided last and survives.
    pub(crate) fn trace_buckets(&self) -> Vec<(&TraceKey, &[usize])> {
        let mut buckets: Vec<(&TraceKey, &[usize])> = self
            .by_trace
            .iter()
            .map(|(key, members)| (key, members.as_slice()))
            .collect();
        buckets.sort_by_key(|(key, members)| match key {
            TraceKey::Absent => (0, 0),
            TraceKey::Content(_) => (1, members[0]),
        });
        buckets
    }
}
