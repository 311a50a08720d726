//! Redundancy reduction for a logged error's exception-record chain.
//!
//! An error reported to an error-tracking backend arrives as an ordered
//! sequence of exception records — one per layer of its causal chain:
//! the logging call site, wrappers that added file/line context, and the
//! raw underlying fault. The same fault is frequently captured several
//! times at different levels of abstraction, which duplicates noise
//! downstream and buries the real signal.
//!
//! This crate reduces one such sequence in a single shot:
//! - records indexed by type, value (annotation-aware), trace content,
//!   and trailing call-chain runs
//! - equivalent records merged, keeping the most informative survivor
//! - repeated call-chain tails trimmed from shallower captures
//!
//! ```
//! use exception_dedup::{dedup_exceptions, ExceptionRecord};
//!
//! let input = vec![
//!     ExceptionRecord::new("i/o timeout", ""),
//!     ExceptionRecord::new("dial tcp 1.1.1.1:1111", "i/o timeout"),
//!     ExceptionRecord::new("dial tcp 1.1.1.1:1111", "i/o timeout"),
//! ];
//! let output = dedup_exceptions(input);
//! assert_eq!(output.len(), 1);
//! ```
//!
//! Producing the initial sequence from a log event and delivering the
//! reduced sequence to a backend are the embedding application's
//! concern; this crate is the reduction engine and its data model only.
//! Diagnostics go through the `log` facade; install any backend to see
//! drop decisions at debug level and full record dumps at trace level.

mod engine;
mod hash;
mod index;
mod record;

pub use engine::{dedup_exceptions, Deduplicator};
pub use record::{ExceptionRecord, Frame, RecordDump, StackTrace};
