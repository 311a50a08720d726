//! The deduplication engine.
//!
//! One logged error often captures the same underlying fault several
//! times: a raw inner error, a wrapper that adds file/line context, and
//! the logging call site's own record. This module reduces that noise in
//! two stages:
//!
//! - whole-record merging: a record yields to an equivalent, better, or
//!   already-surviving record found through the type/value/trace indices
//! - frame trimming: a record whose trace repeats another record's
//!   trailing call chain loses the repeated run and everything above it
//!
//! Decisions never mutate the sequence directly. Each pass marks records
//! and frames in drop sets that only the materialization step consumes,
//! so every decision within a pass sees a consistent snapshot of the
//! sequence. Marks made earlier in a pass are visible to later decisions
//! in that pass, which is what lets exact duplicates collapse to a single
//! survivor instead of all dropping at once.
//!
//! The schedule is fixed at two rounds: index, merge, trim, materialize,
//! then index, merge, materialize again. The second round catches
//! duplicates that only become visible once trimming has emptied a
//! trace. Running the engine on its own output changes nothing.

use std::collections::HashSet;

use crate::hash::TraceKey;
use crate::index::{FrameRef, RecordIndices};
use crate::record::{ExceptionRecord, RecordDump};

/// Reduces one exception sequence in a single shot.
///
/// Holds no state across invocations; construct, call
/// [`dedup`](Self::dedup), done. Concurrent callers operate on
/// independently owned sequences and never share state.
pub struct Deduplicator {
    records: Vec<ExceptionRecord>,
    indices: RecordIndices,
    dropped_records: HashSet<usize>,
    dropped_frames: HashSet<FrameRef>,
}

impl Deduplicator {
    pub fn new(records: Vec<ExceptionRecord>) -> Self {
        let mut dedup = Self {
            records,
            indices: RecordIndices::default(),
            dropped_records: HashSet::new(),
            dropped_frames: HashSet::new(),
        };
        dedup.reindex();
        dedup
    }

    /// Run the fixed two-round reduction schedule and return the reduced
    /// sequence: an order-preserving subsequence of the input whose
    /// surviving traces are order-preserving subsequences of their
    /// originals.
    pub fn dedup(mut self) -> Vec<ExceptionRecord> {
        let input_len = self.records.len();

        self.reduce_names();
        self.reduce_frames();
        self.materialize();

        // Positions shifted; all indices and marks are stale.
        self.reindex();
        self.reduce_names();
        self.materialize();

        log::debug!("reduced {input_len} records to {}", self.records.len());
        self.records
    }

    /// Rebuild every index for the current sequence and discard all
    /// drop marks.
    fn reindex(&mut self) {
        self.indices = RecordIndices::build(&self.records);
        self.dropped_records.clear();
        self.dropped_frames.clear();
    }

    /// Whether a frameless record should yield to `candidates`: any
    /// candidate carrying frames subsumes it, and any equally frameless
    /// candidate that is still alive wins the tie.
    fn should_drop_frameless(&self, candidates: &[usize]) -> bool {
        let mut with_frames = 0usize;
        let mut alive = 0usize;
        for &candidate in candidates {
            if self.records[candidate].has_frames() {
                with_frames += 1;
            } else if !self.dropped_records.contains(&candidate) {
                alive += 1;
            }
        }
        log::trace!("frameless drop check: {with_frames} candidates with frames, {alive} alive");
        with_frames > 0 || alive > 0
    }

    /// Whether a framed record should yield: only to a candidate that is
    /// still alive.
    fn should_drop_framed(&self, candidates: &[usize]) -> bool {
        candidates
            .iter()
            .any(|candidate| !self.dropped_records.contains(candidate))
    }

    /// Whole-record merge pass over the trace-content buckets.
    ///
    /// Buckets are visited sentinel first, then in first-appearance
    /// order; members ascending within a bucket. The last equivalent
    /// record standing survives the tie.
    fn reduce_names(&mut self) {
        let buckets = self.indices.trace_buckets();
        for (key, members) in buckets {
            match key {
                TraceKey::Absent => {
                    for &i in members {
                        let record = &self.records[i];
                        if record.value.is_empty() {
                            match self.indices.by_type.get(&record.ty) {
                                // The type bucket always contains `i`, so an
                                // equivalent record requires more than one hit.
                                Some(type_ids) if type_ids.len() > 1 => {
                                    if self.should_drop_frameless(type_ids) {
                                        log::debug!(
                                            "record {i} dropped: duplicate of a record with the same type"
                                        );
                                        self.dropped_records.insert(i);
                                    }
                                }
                                _ => {
                                    // A type-only record whose type reappears
                                    // as another record's value is the same
                                    // fault surfaced one layer out.
                                    if let Some(value_ids) =
                                        self.indices.by_value.get(&record.ty)
                                    {
                                        if self.should_drop_frameless(value_ids) {
                                            log::debug!(
                                                "record {i} dropped: type matches another record's value"
                                            );
                                            self.dropped_records.insert(i);
                                        }
                                    }
                                }
                            }
                        } else if let Some(type_ids) = self.indices.by_type.get(&record.ty) {
                            if type_ids.len() > 1 {
                                if let Some(value_ids) = self.indices.by_value.get(&record.value)
                                {
                                    let matched = intersect_excluding(type_ids, value_ids, i);
                                    if self.should_drop_frameless(&matched) {
                                        log::debug!(
                                            "record {i} dropped: equivalent type and value elsewhere"
                                        );
                                        self.dropped_records.insert(i);
                                    }
                                }
                            }
                        }
                    }
                }
                TraceKey::Content(_) => {
                    if members.len() < 2 {
                        continue;
                    }
                    // Byte-identical traces: keep one of each equivalent
                    // type + value group.
                    for &i in members {
                        let record = &self.records[i];
                        if let Some(type_ids) = self.indices.by_type.get(&record.ty) {
                            if type_ids.len() > 1 {
                                if let Some(value_ids) = self.indices.by_value.get(&record.value)
                                {
                                    let matched = intersect_excluding(type_ids, value_ids, i);
                                    if self.should_drop_framed(&matched) {
                                        log::debug!(
                                            "record {i} dropped: identical trace, type, and value elsewhere"
                                        );
                                        self.dropped_records.insert(i);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Frame-trim pass over the suffix buckets.
    ///
    /// A bucket with several refs means several records end in the same
    /// call-chain run. Every ref but the last is a shallower or earlier
    /// capture; its opening frame and everything above it are noise once
    /// the canonical capture exists. Marks are unconditional, so bucket
    /// order does not matter here.
    fn reduce_frames(&mut self) {
        for refs in self.indices.by_suffix.values() {
            if refs.len() < 2 {
                continue;
            }
            for fref in &refs[..refs.len() - 1] {
                log::debug!(
                    "record {} frames 0..={} dropped: shared call-chain tail",
                    fref.record,
                    fref.frame
                );
                self.dropped_frames.insert(*fref);
                for frame in 0..fref.frame {
                    self.dropped_frames.insert(FrameRef {
                        record: fref.record,
                        frame,
                    });
                }
            }
        }
    }

    /// Apply all pending drop marks, producing the next sequence version.
    ///
    /// Dropped records are omitted; surviving records lose their dropped
    /// frames but keep the remaining frames in order. A trace that loses
    /// every frame stays present-but-empty.
    fn materialize(&mut self) {
        let records = std::mem::take(&mut self.records);
        let mut kept = Vec::with_capacity(records.len());

        for (i, mut record) in records.into_iter().enumerate() {
            if self.dropped_records.contains(&i) {
                continue;
            }
            if let Some(trace) = record.stacktrace.as_mut() {
                let frames = std::mem::take(&mut trace.frames);
                trace.frames = frames
                    .into_iter()
                    .enumerate()
                    .filter(|&(frame, _)| {
                        !self.dropped_frames.contains(&FrameRef { record: i, frame })
                    })
                    .map(|(_, frame)| frame)
                    .collect();
            }
            kept.push(record);
        }

        self.records = kept;
    }
}

/// Records present in both index buckets, excluding the record under
/// decision. `type_ids` is ascending and duplicate-free, so the result
/// is too.
fn intersect_excluding(type_ids: &[usize], value_ids: &[usize], current: usize) -> Vec<usize> {
    let value_set: HashSet<usize> = value_ids.iter().copied().collect();
    type_ids
        .iter()
        .copied()
        .filter(|&id| id != current && value_set.contains(&id))
        .collect()
}

/// Reduce the exception-record sequence of one logged error.
///
/// Convenience wrapper around [`Deduplicator`] that also dumps the input
/// and output sequences at trace level.
pub fn dedup_exceptions(records: Vec<ExceptionRecord>) -> Vec<ExceptionRecord> {
    if log::log_enabled!(log::Level::Trace) {
        for record in &records {
            log::trace!("dedup input:\n{}", RecordDump(record));
        }
    }

    let output = Deduplicator::new(records).dedup();

    if log::log_enabled!(log::Level::Trace) {
        for record in &output {
            log::trace!("dedup output:\n{}", RecordDump(record));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Frame;

    fn frame(function: &str, lineno: u32) -> Frame {
        Frame {
            function: function.into(),
            lineno,
            ..Frame::default()
        }
    }

    #[test]
    fn test_intersect_excluding_drops_self_and_non_members() {
        let type_ids = [0, 1, 2, 3];
        let value_ids = [1, 1, 3, 5];
        assert_eq!(intersect_excluding(&type_ids, &value_ids, 1), vec![3]);
        assert_eq!(intersect_excluding(&type_ids, &value_ids, 4), vec![1, 3]);
        assert_eq!(intersect_excluding(&[0], &[], 0), Vec::<usize>::new());
    }

    #[test]
    fn test_frameless_policy_yields_to_frames_even_when_dropped() {
        let dedup = Deduplicator::new(vec![
            ExceptionRecord::new("t", "v"),
            ExceptionRecord::with_trace("t", "v", vec![frame("f", 1)]),
        ]);
        // Candidate 1 carries frames; the policy fires regardless of its
        // own drop state.
        assert!(dedup.should_drop_frameless(&[1]));
    }

    #[test]
    fn test_frameless_policy_yields_to_a_surviving_duplicate_only() {
        let mut dedup = Deduplicator::new(vec![
            ExceptionRecord::new("t", "v"),
            ExceptionRecord::new("t", "v"),
        ]);
        assert!(dedup.should_drop_frameless(&[1]));

        dedup.dropped_records.insert(1);
        assert!(!dedup.should_drop_frameless(&[1]));
    }

    #[test]
    fn test_framed_policy_counts_only_survivors() {
        let mut dedup = Deduplicator::new(vec![
            ExceptionRecord::with_trace("t", "v", vec![frame("f", 1)]),
            ExceptionRecord::with_trace("t", "v", vec![frame("f", 1)]),
        ]);
        assert!(dedup.should_drop_framed(&[1]));

        dedup.dropped_records.insert(1);
        assert!(!dedup.should_drop_framed(&[1]));
    }

    #[test]
    fn test_materialize_keeps_an_emptied_trace_present() {
        let mut dedup = Deduplicator::new(vec![ExceptionRecord::with_trace(
            "t",
            "v",
            vec![frame("a", 1), frame("b", 2)],
        )]);
        dedup.dropped_frames.insert(FrameRef { record: 0, frame: 0 });
        dedup.dropped_frames.insert(FrameRef { record: 0, frame: 1 });
        dedup.materialize();

        let trace = dedup.records[0]
            .stacktrace
            .as_ref()
            .expect("trace stays present");
        assert!(trace.frames.is_empty());
    }

    #[test]
    fn test_materialize_preserves_surviving_frame_order() {
        let mut dedup = Deduplicator::new(vec![ExceptionRecord::with_trace(
            "t",
            "v",
            vec![frame("a", 1), frame("b", 2), frame("c", 3)],
        )]);
        dedup.dropped_frames.insert(FrameRef { record: 0, frame: 1 });
        dedup.materialize();

        let trace = dedup.records[0].stacktrace.as_ref().expect("trace present");
        let functions: Vec<&str> = trace
            .frames
            .iter()
            .map(|f| f.function.as_str())
            .collect();
        assert_eq!(functions, vec!["a", "c"]);
    }
}
