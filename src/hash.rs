//! Content hashing of frame sequences.
//!
//! Trace equality is decided by SHA-256 digests over an explicit
//! field-by-field serialization of the frames, never by pointer identity
//! or a derived `Hash`. Two traces with identical frames in identical
//! order digest identically; distinct content does not collide in
//! practice.

use sha2::{Digest, Sha256};

use crate::record::{Frame, StackTrace};

/// Digest of a frame sequence's content.
pub(crate) type TraceDigest = [u8; 32];

/// Key of the trace-content index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TraceKey {
    /// Absent or empty trace. All frameless records share this bucket.
    Absent,
    /// Digest of a non-empty frame sequence.
    Content(TraceDigest),
}

/// Index key for a record's trace.
pub(crate) fn trace_key(trace: Option<&StackTrace>) -> TraceKey {
    match trace {
        Some(trace) if !trace.frames.is_empty() => TraceKey::Content(hash_frames(&trace.frames)),
        _ => TraceKey::Absent,
    }
}

/// Digest of an ordered frame sequence, first frame to last.
pub(crate) fn hash_frames(frames: &[Frame]) -> TraceDigest {
    let mut buf = Vec::new();
    for frame in frames {
        write_frame(&mut buf, frame);
    }
    digest(&buf)
}

/// Incremental digests over a trace's trailing runs.
///
/// Frames are fed last-to-first; each [`extend`](Self::extend) covers one
/// more frame towards the front of the trace and returns the digest of the
/// trailing run covered so far. Two traces sharing their last `k` frames
/// produce equal digests at step `k`.
pub(crate) struct SuffixHasher {
    buf: Vec<u8>,
}

impl SuffixHasher {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Extend the trailing run by one frame and return its digest.
    pub(crate) fn extend(&mut self, frame: &Frame) -> TraceDigest {
        write_frame(&mut self.buf, frame);
        digest(&self.buf)
    }
}

fn digest(buf: &[u8]) -> TraceDigest {
    let mut hasher = Sha256::new();
    hasher.update(buf);
    hasher.finalize().into()
}

/// Serialize one frame into the digest buffer, NUL-delimited per field.
fn write_frame(buf: &mut Vec<u8>, frame: &Frame) {
    const SEP: &[u8] = b"\x00";

    buf.extend_from_slice(frame.function.as_bytes());
    buf.extend_from_slice(SEP);
    buf.extend_from_slice(frame.module.as_bytes());
    buf.extend_from_slice(SEP);
    buf.extend_from_slice(frame.filename.as_bytes());
    buf.extend_from_slice(SEP);
    buf.extend_from_slice(frame.abs_path.as_bytes());
    buf.extend_from_slice(SEP);
    buf.extend_from_slice(frame.lineno.to_string().as_bytes());
    buf.extend_from_slice(SEP);
    buf.extend_from_slice(frame.colno.to_string().as_bytes());
    buf.extend_from_slice(SEP);
    buf.extend_from_slice(if frame.in_app { b"1" } else { b"0" });
    buf.extend_from_slice(SEP);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(function: &str, lineno: u32) -> Frame {
        Frame {
            function: function.into(),
            lineno,
            ..Frame::default()
        }
    }

    #[test]
    fn test_identical_content_hashes_identically() {
        let a = vec![frame("outer", 10), frame("inner", 20)];
        let b = a.clone();
        assert_eq!(hash_frames(&a), hash_frames(&b));
    }

    #[test]
    fn test_any_field_change_changes_the_digest() {
        let base = vec![frame("outer", 10)];
        let mut moved = base.clone();
        moved[0].lineno = 11;
        assert_ne!(hash_frames(&base), hash_frames(&moved));

        let mut flagged = base.clone();
        flagged[0].in_app = true;
        assert_ne!(hash_frames(&base), hash_frames(&flagged));
    }

    #[test]
    fn test_frame_order_is_significant() {
        let forward = vec![frame("outer", 10), frame("inner", 20)];
        let backward = vec![frame("inner", 20), frame("outer", 10)];
        assert_ne!(hash_frames(&forward), hash_frames(&backward));
    }

    #[test]
    fn test_absent_and_empty_traces_share_the_sentinel_key() {
        assert_eq!(trace_key(None), TraceKey::Absent);
        assert_eq!(trace_key(Some(&StackTrace::new(vec![]))), TraceKey::Absent);
        assert_ne!(
            trace_key(Some(&StackTrace::new(vec![frame("f", 1)]))),
            TraceKey::Absent
        );
    }

    #[test]
    fn test_shared_tails_digest_equal_per_suffix_length() {
        // Two traces ending in the same two frames but diverging above.
        let shared_a = frame("load", 30);
        let shared_b = frame("status", 40);
        let trace_one = [frame("serve", 10), shared_a.clone(), shared_b.clone()];
        let trace_two = [frame("dispatch", 5), frame("invoke", 15), shared_a, shared_b];

        let mut one = SuffixHasher::new();
        let mut two = SuffixHasher::new();

        // k = 1: both tails are ["status"].
        let one_k1 = one.extend(&trace_one[2]);
        let two_k1 = two.extend(&trace_two[3]);
        assert_eq!(one_k1, two_k1);

        // k = 2: both tails are ["load", "status"].
        let one_k2 = one.extend(&trace_one[1]);
        let two_k2 = two.extend(&trace_two[2]);
        assert_eq!(one_k2, two_k2);

        // k = 3: tails diverge ("serve" vs "invoke").
        let one_k3 = one.extend(&trace_one[0]);
        let two_k3 = two.extend(&trace_two[1]);
        assert_ne!(one_k3, two_k3);

        // Digests at different suffix lengths never coincide.
        assert_ne!(one_k1, one_k2);
    }
}
