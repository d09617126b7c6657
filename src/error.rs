//! # Error & diagnostics types
//!
//! Two tiers, per the core's error-handling design:
//!
//! - [`NotationError`] — fatal conditions. Parsing stops and nothing is
//!   emitted. Every variant carries enough context (position, or the
//!   offending value) to build a useful message without a global logger.
//! - [`Diagnostic`] — non-fatal conditions. Interpretation or evaluation
//!   continues and still produces output; diagnostics are collected into
//!   an ordered list and handed back to the caller, never written to a
//!   global logger.

use thiserror::Error;

/// Fatal errors from parsing, interpretation, or modulation evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotationError {
    /// A bar|beat or modulation source string could not be tokenized or parsed.
    #[error("syntax error at line {line}, column {column}: {message}")]
    SyntaxError {
        offset: usize,
        line: usize,
        column: usize,
        message: String,
    },

    /// A numeric value is outside its legal range (pitch, velocity, probability).
    #[error("{what} {value} is out of range at line {line}, column {column}")]
    OutOfRange {
        what: &'static str,
        value: String,
        line: usize,
        column: usize,
    },

    /// A `@DEST=SRC` bar-copy operation referenced a malformed bar range.
    #[error("malformed bar copy at line {line}, column {column}: {message}")]
    MalformedBarCopy {
        message: String,
        line: usize,
        column: usize,
    },

    /// A modulation expression referenced a variable or parameter name the
    /// evaluator does not know.
    #[error("unknown identifier '{name}' in modulation expression")]
    UnknownIdentifier { name: String },

    /// `ramp(...)` was called with fewer than the two required bounds.
    #[error("ramp() requires at least a start and end value")]
    RampMissingBounds,

    /// `ramp(...)` was called with a non-positive `speed` argument.
    #[error("ramp() speed must be greater than zero")]
    RampNonPositiveSpeed,

    /// A periodic waveform (`cos`, `tri`, `saw`, `square`) was given a
    /// non-positive period.
    #[error("waveform period must be greater than zero")]
    NonPositivePeriod,
}

/// Classifies a [`Diagnostic`] so tests (and hosts that want to filter)
/// can distinguish diagnostic classes without string-matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Pitches were buffered but discarded by a bar-copy or `@clear` before
    /// ever being emitted.
    BufferWaste,
    /// A time position was reached with no pitches buffered.
    EmptyTimePosition,
    /// A repeat pattern (`xN`) expanded to more than 100 positions.
    ExcessiveRepeat,
    /// A state token changed `current_*` after the last pitch of a group
    /// was buffered, so the change did not affect that group.
    StateChangeAfterLastPitch,
    /// The modulation source failed to parse; the whole block was skipped.
    ModulationParseFailure,
    /// One modulation assignment failed to evaluate and was skipped.
    ModulationEvalFailure,
}

/// A single non-fatal diagnostic.
///
/// `Display`s as a plain message, satisfying the core's "ordered list of
/// strings" contract; callers that want structured filtering can match on
/// [`Diagnostic::kind`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_displays_message_only() {
        let d = Diagnostic::new(DiagnosticKind::BufferWaste, "2 pitches buffered but not emitted");
        assert_eq!(d.to_string(), "2 pitches buffered but not emitted");
        assert_eq!(d.kind(), DiagnosticKind::BufferWaste);
    }

    #[test]
    fn syntax_error_message_format() {
        let e = NotationError::SyntaxError {
            offset: 4,
            line: 1,
            column: 5,
            message: "unexpected character 'z'".to_string(),
        };
        assert_eq!(e.to_string(), "syntax error at line 1, column 5: unexpected character 'z'");
    }
}
