//! Mutable scratch state threaded through a single `interpret()` call.
//!
//! Created, mutated, and dropped by one invocation; nothing here is shared
//! across calls or held by the caller.

use crate::note::NoteEvent;

/// Velocity carried by the interpreter's running state: either a fixed
/// value or a range, mutually exclusive as in the surface grammar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityState {
    Single(u8),
    Range(u8, u8),
}

impl Default for VelocityState {
    fn default() -> Self {
        VelocityState::Single(100)
    }
}

/// A buffered pitch: the validated MIDI pitch plus the state snapshot
/// captured at the moment it was pushed into the group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedPitch {
    pub pitch: u8,
    pub velocity: VelocityState,
    pub duration: f64,
    pub probability: f64,
}

impl BufferedPitch {
    pub fn to_note_event(&self, start_time: f64, duration_engine_beats: f64) -> NoteEvent {
        let (velocity, velocity_deviation) = match self.velocity {
            VelocityState::Single(v) => (v, 0),
            VelocityState::Range(min, max) => (min, max - min),
        };
        NoteEvent {
            pitch: self.pitch,
            start_time,
            duration: duration_engine_beats,
            velocity,
            velocity_deviation,
            probability: self.probability,
        }
    }
}

/// All mutable state for one interpretation run.
#[derive(Debug)]
pub struct InterpreterState {
    pub current_velocity: VelocityState,
    pub current_duration: f64,
    pub current_probability: f64,
    /// Bar of the last time position, explicit or defaulted (including
    /// spillover from a repeat pattern or bar copy). `None` until the first
    /// time position is processed, at which point it is always `Some`
    /// (defaulting to bar 1 when no explicit bar has been given). This is
    /// the bar a bar-copy op with an omitted source falls back to.
    pub current_bar: Option<u32>,
    /// The most recent bar number an element actually wrote out (`N|beat`,
    /// never `|beat`). Distinct from `current_bar`: an implicit `|beat`
    /// that spills into the next bar moves `current_bar` but leaves this
    /// field untouched, since the next implicit position should still
    /// resolve against the last bar someone actually named.
    pub last_explicit_bar: Option<u32>,
    pub current_pitches: Vec<BufferedPitch>,
    pub pitch_group_started: bool,
    pub pitches_emitted: bool,
    pub state_changed_since_last_pitch: bool,
    pub state_changed_after_emission: bool,
}

impl InterpreterState {
    pub fn new() -> Self {
        Self {
            current_velocity: VelocityState::default(),
            current_duration: 1.0,
            current_probability: 1.0,
            current_bar: None,
            last_explicit_bar: None,
            current_pitches: Vec::new(),
            pitch_group_started: false,
            pitches_emitted: false,
            state_changed_since_last_pitch: false,
            state_changed_after_emission: false,
        }
    }

    /// Resolve an implicit (`None`) bar: the most recent explicit bar if
    /// one has been named so far, else bar 1.
    pub fn resolve_bar(&self, explicit: Option<u32>) -> u32 {
        explicit.unwrap_or_else(|| self.last_explicit_bar.unwrap_or(1))
    }
}
