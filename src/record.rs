//! Data model for exception records.
//!
//! One logged error is described by an ordered sequence of
//! [`ExceptionRecord`]s — index 0 is the outermost layer (typically the
//! logging call site), increasing indices are progressively more specific
//! inner causes. The deduplication engine only ever drops records or
//! frames from this sequence; it never reorders it.
//!
//! Field names follow the error-tracking wire convention (`type`,
//! `abs_path`, `in_app`), so sequences serialize directly into the shape
//! a reporting sink expects.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One stack location within a trace.
///
/// Equality is structural over all fields; two frames captured at the same
/// location with the same metadata compare equal regardless of which trace
/// they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Function (or method) name as reported by the runtime.
    #[serde(default)]
    pub function: String,
    /// Defining module or package.
    #[serde(default)]
    pub module: String,
    /// Source file name, relative to the build root.
    #[serde(default)]
    pub filename: String,
    /// Absolute path of the source file.
    #[serde(default)]
    pub abs_path: String,
    /// 1-based line number.
    #[serde(default)]
    pub lineno: u32,
    /// 1-based column number (0 when the runtime does not report columns).
    #[serde(default)]
    pub colno: u32,
    /// Application code vs. library/runtime code.
    #[serde(default)]
    pub in_app: bool,
}

/// An ordered sequence of frames, outermost call first.
///
/// A record's trace is `Option<StackTrace>`: `None` (no trace available)
/// and `Some` with empty `frames` are distinct states. Reduction can turn
/// the latter into the former's hash bucket but never conflates them in
/// the output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTrace {
    pub frames: Vec<Frame>,
}

impl StackTrace {
    /// Build a trace from an ordered frame sequence.
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}

/// One layer of a logged error's causal chain.
///
/// `ty` is the short classifying title (an error category or message
/// prefix). `value` is the descriptive subtitle; the logging layer may
/// append a trailing call-site annotation of the form
/// `" (identifier:line)"` to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<StackTrace>,
}

impl ExceptionRecord {
    /// Build a record with no trace.
    pub fn new(ty: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            value: value.into(),
            stacktrace: None,
        }
    }

    /// Build a record carrying a trace.
    pub fn with_trace(
        ty: impl Into<String>,
        value: impl Into<String>,
        frames: Vec<Frame>,
    ) -> Self {
        Self {
            ty: ty.into(),
            value: value.into(),
            stacktrace: Some(StackTrace::new(frames)),
        }
    }

    /// Whether the record carries at least one frame.
    ///
    /// Absent and present-but-empty traces both count as frameless.
    pub fn has_frames(&self) -> bool {
        self.stacktrace
            .as_ref()
            .is_some_and(|trace| !trace.frames.is_empty())
    }
}

/// Multi-line human-readable rendering of a record, for diagnostics.
///
/// Rendered through the `log` facade at trace level when the engine dumps
/// its input and output sequences.
pub struct RecordDump<'a>(pub &'a ExceptionRecord);

impl fmt::Display for RecordDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Type: {}", self.0.ty)?;
        writeln!(f, "Value: {}", self.0.value)?;
        match &self.0.stacktrace {
            None => writeln!(f, "Stacktrace: absent")?,
            Some(trace) => {
                writeln!(f, "Stacktrace ({} frames):", trace.frames.len())?;
                for (i, frame) in trace.frames.iter().enumerate() {
                    writeln!(
                        f,
                        "  {i}: {} (line {} col {}){}",
                        frame.function,
                        frame.lineno,
                        frame.colno,
                        if frame.in_app { " [app]" } else { "" }
                    )?;
                    writeln!(f, "     module: {} file: {}", frame.module, frame.filename)?;
                }
            }
        }
        Ok(())
    }
}
