//! # Note-event model
//!
//! [`NoteEvent`] is the canonical record every stage of the pipeline
//! produces or consumes: the interpreter emits a `Vec<NoteEvent>`, the
//! modulation evaluator mutates one in place, and the formatter consumes a
//! slice of them to re-serialize bar|beat text.

use serde::{Deserialize, Serialize};

/// Minimum legal note duration, in engine beats.
pub const MIN_DURATION: f64 = 0.001;

/// A single timed note, the unit of exchange with an external DAW bridge.
///
/// # Invariants (on any emitted sequence)
/// - `velocity >= 1` (an event with `velocity == 0` is a transient deletion
///   marker during interpretation and is never present in final output)
/// - `velocity + velocity_deviation <= 127`
/// - `duration >= MIN_DURATION`
/// - `0.0 <= probability <= 1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    /// MIDI pitch, 0-127.
    pub pitch: u8,
    /// Start time in engine beats (quarter-note units), non-negative.
    pub start_time: f64,
    /// Duration in engine beats, `>= MIN_DURATION`.
    pub duration: f64,
    /// Velocity, 1-127 in final output. `0` is used transiently during
    /// interpretation as a deletion marker (see the interpreter's v0
    /// deletion pass) and never appears in a value returned to a caller.
    pub velocity: u8,
    /// Extra velocity headroom for a velocity *range*: the note plays
    /// somewhere in `[velocity, velocity + velocity_deviation]`.
    pub velocity_deviation: u8,
    /// Probability the note plays at all, `0.0..=1.0`.
    pub probability: f64,
}

impl NoteEvent {
    /// True if `pitch` and `start_time` match within the core's epsilon
    /// tolerance — the identity used by v0 deletion and by formatter
    /// grouping.
    pub fn matches_position(&self, pitch: u8, start_time: f64) -> bool {
        self.pitch == pitch && crate::time::beats_eq(self.start_time, start_time)
    }
}
