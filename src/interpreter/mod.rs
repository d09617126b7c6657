//! # bar|beat interpreter
//!
//! Walks a [`crate::parser::TokenStream`] with a small stack machine whose
//! output-producing step is the *time position*: pitches accumulate into a
//! buffer and a time position flushes them, using the state snapshot
//! captured with each pitch when it was buffered. See module-level
//! submodules for the supporting pieces:
//!
//! - [`state`] — `InterpreterState`, `VelocityState`, `BufferedPitch`.
//! - [`barcopy`] — the `@DEST=SRC` tiling arithmetic.

pub mod barcopy;
pub mod state;

use crate::error::{Diagnostic, DiagnosticKind, NotationError};
use crate::note::{NoteEvent, MIN_DURATION};
use crate::parser::{Beat, PositionedToken, Token, TokenStream};
use crate::time;

use barcopy::BarMemory;
use state::{BufferedPitch, InterpreterState, VelocityState};

const EXCESSIVE_REPEAT_THRESHOLD: u32 = 100;

/// Bundles both views of an interpretation run: the v0-filtered output
/// every ordinary caller wants, and the pre-filter view needed by a host
/// that merges new notation into an existing region and must see
/// deletion markers explicitly.
#[derive(Debug, Clone)]
pub struct InterpretOutput {
    /// Final output: v0 deletion markers applied and removed.
    pub events: Vec<NoteEvent>,
    /// Emission-order events before v0 filtering, deletion markers included.
    pub unfiltered: Vec<NoteEvent>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Interpret a token stream into the filtered note-event sequence plus
/// diagnostics. The common-case entry point.
pub fn interpret(tokens: &TokenStream, num: u32, den: u32) -> Result<(Vec<NoteEvent>, Vec<Diagnostic>), NotationError> {
    let output = interpret_with_merge_view(tokens, num, den)?;
    Ok((output.events, output.diagnostics))
}

/// Interpret a token stream, returning both the filtered and unfiltered
/// views. Only needed by a host that merges new notation into an existing
/// region and must see deletion markers explicitly.
pub fn interpret_with_merge_view(tokens: &TokenStream, num: u32, den: u32) -> Result<InterpretOutput, NotationError> {
    let mut state = InterpreterState::new();
    let mut diagnostics = Vec::new();
    let mut unfiltered = Vec::new();
    let mut memory = BarMemory::new();

    for positioned in tokens {
        process_token(positioned, num, den, &mut state, &mut memory, &mut unfiltered, &mut diagnostics)?;
    }

    if !state.current_pitches.is_empty() && !state.pitches_emitted {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::BufferWaste,
            format!("{} pitch(es) buffered but no time position", state.current_pitches.len()),
        ));
    }

    let events = filter_v0_deletions(&unfiltered);
    Ok(InterpretOutput { events, unfiltered, diagnostics })
}

fn process_token(
    positioned: &PositionedToken,
    num: u32,
    den: u32,
    state: &mut InterpreterState,
    memory: &mut BarMemory,
    unfiltered: &mut Vec<NoteEvent>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), NotationError> {
    let PositionedToken { token, line, column, .. } = *positioned;
    match token {
        Token::Pitch { pitch } => {
            let pitch = validate_pitch(pitch, line, column)?;
            push_pitch(state, pitch);
        }
        Token::Velocity { value } => {
            let v = validate_velocity_component(value, line, column)?;
            apply_state_change(state, |s| s.current_velocity = VelocityState::Single(v));
        }
        Token::VelocityRange { min, max } => {
            let min = validate_velocity_component(min, line, column)?;
            let max = validate_velocity_component(max, line, column)?;
            if max < min {
                return Err(NotationError::OutOfRange {
                    what: "velocity range",
                    value: format!("{}-{}", min, max),
                    line,
                    column,
                });
            }
            apply_state_change(state, |s| s.current_velocity = VelocityState::Range(min, max));
        }
        Token::Duration { value } => {
            apply_state_change(state, |s| s.current_duration = value);
        }
        Token::Probability { value } => {
            let value = validate_probability(value, line, column)?;
            apply_state_change(state, |s| s.current_probability = value);
        }
        Token::TimePosition { bar, beat } => {
            emit_time_position(state, bar, beat, num, den, memory, unfiltered, diagnostics);
        }
        Token::BarCopy { destination, source } => {
            flush_buffer_waste(state, diagnostics);
            let current_bar = state.current_bar.unwrap_or(1);
            let produced = barcopy::apply_bar_copy(memory, destination, source, current_bar, num, den);
            unfiltered.extend(produced);
            reset_after_group_boundary(state);
        }
        Token::ClearBuffer => {
            flush_buffer_waste(state, diagnostics);
            memory.clear();
            reset_after_group_boundary(state);
        }
    }
    Ok(())
}

fn validate_pitch(pitch: i16, line: usize, column: usize) -> Result<u8, NotationError> {
    if (0..=127).contains(&pitch) {
        Ok(pitch as u8)
    } else {
        Err(NotationError::OutOfRange { what: "pitch", value: pitch.to_string(), line, column })
    }
}

fn validate_velocity_component(value: u32, line: usize, column: usize) -> Result<u8, NotationError> {
    if value <= 127 {
        Ok(value as u8)
    } else {
        Err(NotationError::OutOfRange { what: "velocity", value: value.to_string(), line, column })
    }
}

fn validate_probability(value: f64, line: usize, column: usize) -> Result<f64, NotationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(NotationError::OutOfRange { what: "probability", value: value.to_string(), line, column })
    }
}

/// Push a validated pitch into the buffer, applying the group-start rule:
/// the buffer clears on the first pitch after a time position.
fn push_pitch(state: &mut InterpreterState, pitch: u8) {
    if !state.pitch_group_started {
        state.current_pitches.clear();
        state.pitch_group_started = true;
        state.pitches_emitted = false;
    }
    state.current_pitches.push(BufferedPitch {
        pitch,
        velocity: state.current_velocity,
        duration: state.current_duration,
        probability: state.current_probability,
    });
}

/// Apply a state-token mutation under one of two regimes: if a pitch
/// group is open, only the live state updates; otherwise the mutation also
/// rewrites every already-buffered pitch's matching field.
fn apply_state_change(state: &mut InterpreterState, mutate: impl Fn(&mut InterpreterState)) {
    mutate(state);
    if state.pitch_group_started {
        state.state_changed_since_last_pitch = true;
    } else {
        state.state_changed_after_emission = true;
        let velocity = state.current_velocity;
        let duration = state.current_duration;
        let probability = state.current_probability;
        for buffered in &mut state.current_pitches {
            buffered.velocity = velocity;
            buffered.duration = duration;
            buffered.probability = probability;
        }
    }
}

fn emit_time_position(
    state: &mut InterpreterState,
    bar: Option<u32>,
    beat: Beat,
    num: u32,
    den: u32,
    memory: &mut BarMemory,
    unfiltered: &mut Vec<NoteEvent>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let resolved_bar = state.resolve_bar(bar);
    if bar.is_some() {
        state.current_bar = bar;
        state.last_explicit_bar = bar;
    } else if state.current_bar.is_none() {
        state.current_bar = Some(1);
    }

    if state.current_pitches.is_empty() {
        diagnostics.push(Diagnostic::new(DiagnosticKind::EmptyTimePosition, "time position reached with no buffered pitches"));
    }
    if state.state_changed_since_last_pitch {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::StateChangeAfterLastPitch,
            "state change after last pitch but before time position won't affect this group",
        ));
    }

    let positions = expand_positions(state, resolved_bar, beat, num, den, diagnostics);

    for absolute in &positions {
        let (bar_at, _) = time::engine_beats_to_bar_beat(*absolute, num, den);
        let bar_start = time::bar_beat_to_engine_beats(bar_at, 1.0, num, den);
        for buffered in &state.current_pitches {
            let duration_engine = time::musical_beats_to_engine_beats(buffered.duration, den).max(MIN_DURATION);
            let event = buffered.to_note_event(*absolute, duration_engine);
            unfiltered.push(event);
            barcopy::record(memory, bar_at, bar_start, event);
        }
    }

    if let Some(last) = positions.last() {
        let (final_bar, _) = time::engine_beats_to_bar_beat(*last, num, den);
        state.current_bar = Some(final_bar);
    }

    state.pitches_emitted = true;
    state.pitch_group_started = false;
    state.state_changed_since_last_pitch = false;
    state.state_changed_after_emission = false;
}

/// Expand a `Beat` into one or more absolute engine-beat positions,
/// following the repeat-pattern rule for `xN@step` suffixes.
fn expand_positions(
    state: &InterpreterState,
    resolved_bar: u32,
    beat: Beat,
    num: u32,
    den: u32,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<f64> {
    match beat {
        Beat::Scalar(b) => vec![time::bar_beat_to_engine_beats(resolved_bar, b, num, den)],
        Beat::RepeatPattern { start, times, step } => {
            if times > EXCESSIVE_REPEAT_THRESHOLD {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ExcessiveRepeat,
                    format!("repeat pattern expands to {} positions (> {})", times, EXCESSIVE_REPEAT_THRESHOLD),
                ));
            }
            let step_musical = step.unwrap_or(state.current_duration);
            let step_engine = time::musical_beats_to_engine_beats(step_musical, den);
            let start_engine = time::bar_beat_to_engine_beats(resolved_bar, start, num, den);
            (0..times).map(|i| start_engine + i as f64 * step_engine).collect()
        }
    }
}

fn flush_buffer_waste(state: &InterpreterState, diagnostics: &mut Vec<Diagnostic>) {
    let unemitted = !state.current_pitches.is_empty() && !state.pitches_emitted;
    if unemitted && state.state_changed_since_last_pitch {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::BufferWaste,
            format!("{} pitch(es) buffered but discarded before bar copy", state.current_pitches.len()),
        ));
    }
}

fn reset_after_group_boundary(state: &mut InterpreterState) {
    state.current_pitches.clear();
    state.pitch_group_started = false;
    state.pitches_emitted = false;
    state.state_changed_since_last_pitch = false;
    state.state_changed_after_emission = false;
}

/// Single left-to-right pass: each `velocity == 0` marker deletes every
/// earlier entry sharing `(pitch, start_time)` (within [`time::EPSILON`])
/// and is itself dropped from the result.
fn filter_v0_deletions(unfiltered: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut filtered: Vec<NoteEvent> = Vec::new();
    for event in unfiltered {
        if event.velocity == 0 {
            filtered.retain(|e| !e.matches_position(event.pitch, event.start_time));
        } else {
            filtered.push(*event);
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(source: &str, num: u32, den: u32) -> (Vec<NoteEvent>, Vec<Diagnostic>) {
        let tokens = parse(source).unwrap();
        interpret(&tokens, num, den).unwrap()
    }

    #[test]
    fn chord_emission() {
        let (events, _) = run("C3 E3 G3 1|1", 4, 4);
        assert_eq!(events.len(), 3);
        let mut sorted = events.clone();
        sorted.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap().then(a.pitch.cmp(&b.pitch)));
        assert_eq!(sorted[0].pitch, 60);
        assert_eq!(sorted[1].pitch, 64);
        assert_eq!(sorted[2].pitch, 67);
        for e in &sorted {
            assert_eq!(e.start_time, 0.0);
            assert_eq!(e.duration, 1.0);
            assert_eq!(e.velocity, 100);
            assert_eq!(e.probability, 1.0);
        }
    }

    #[test]
    fn pitch_persists_across_implicit_time_positions() {
        let (events, _) = run("C1 1|1 |2 |3 |4", 4, 4);
        assert_eq!(events.len(), 4);
        for (i, e) in events.iter().enumerate() {
            assert_eq!(e.pitch, 36);
            assert_eq!(e.start_time, i as f64);
        }
    }

    #[test]
    fn state_update_after_emission_rewrites_buffered_pitch() {
        let (events, _) = run("v100 C4 1|1 v90 |2", 4, 4);
        assert_eq!(events, vec![
            NoteEvent { pitch: 72, start_time: 0.0, duration: 1.0, velocity: 100, velocity_deviation: 0, probability: 1.0 },
            NoteEvent { pitch: 72, start_time: 1.0, duration: 1.0, velocity: 90, velocity_deviation: 0, probability: 1.0 },
        ]);
    }

    #[test]
    fn bar_copy_with_later_v0_deletes_the_copy() {
        let (events, _) = run("C3 D3 E3 1|1 @2=1 v0 D3 2|1", 4, 4);
        let mut sorted = events.clone();
        sorted.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap().then(a.pitch.cmp(&b.pitch)));
        let at = |t: f64| -> Vec<u8> {
            sorted.iter().filter(|e| (e.start_time - t).abs() < 1e-6).map(|e| e.pitch).collect()
        };
        assert_eq!(at(0.0), vec![60, 62, 64]);
        assert_eq!(at(4.0), vec![60, 64]);
        assert!(events.iter().all(|e| e.velocity != 0));
    }

    #[test]
    fn repeat_pattern_with_explicit_step() {
        let (events, _) = run("Gb1 1|1x8@0.5", 4, 4);
        assert_eq!(events.len(), 8);
        for (i, e) in events.iter().enumerate() {
            assert_eq!(e.pitch, 42);
            assert_eq!(e.start_time, i as f64 * 0.5);
        }
    }

    #[test]
    fn implicit_bar_resolves_against_last_explicit_bar_not_spillover() {
        // The repeat pattern spills its last position into bar 2 without
        // ever naming bar 2 explicitly, so the following `|1` must still
        // resolve against bar 1 (the last bar someone actually wrote),
        // landing back at bar 1 rather than continuing into bar 2.
        let (events, _) = run("C3 1|3x3@2 C4 |1", 4, 4);
        let last = events.last().unwrap();
        assert_eq!(last.pitch, 72);
        assert_eq!(last.start_time, 0.0); // bar 1, beat 1, not bar 2
    }

    #[test]
    fn excessive_repeat_emits_diagnostic() {
        let (_, diagnostics) = run("C3 1|1x150", 4, 4);
        assert!(diagnostics.iter().any(|d| d.kind() == DiagnosticKind::ExcessiveRepeat));
    }

    #[test]
    fn empty_time_position_emits_diagnostic() {
        let (_, diagnostics) = run("|1", 4, 4);
        assert!(diagnostics.iter().any(|d| d.kind() == DiagnosticKind::EmptyTimePosition));
    }

    #[test]
    fn state_change_after_last_pitch_emits_diagnostic_but_does_not_affect_group() {
        // v100 is live when C4 is buffered; v90 arrives after the pitch but
        // before the time position closes the group, so the emitted note
        // still carries velocity 100 and a diagnostic is raised.
        let (events, diagnostics) = run("v100 C4 v90 1|1", 4, 4);
        assert_eq!(events[0].velocity, 100);
        assert!(diagnostics.iter().any(|d| d.kind() == DiagnosticKind::StateChangeAfterLastPitch));
    }

    #[test]
    fn buffer_waste_before_bar_copy_emits_diagnostic_when_state_changed() {
        let (_, diagnostics) = run("C3 v90 @2=1", 4, 4);
        assert!(diagnostics.iter().any(|d| d.kind() == DiagnosticKind::BufferWaste));
    }

    #[test]
    fn unemitted_buffer_before_bar_copy_without_state_change_is_silent() {
        let (_, diagnostics) = run("C3 @2=1", 4, 4);
        assert!(!diagnostics.iter().any(|d| d.kind() == DiagnosticKind::BufferWaste));
    }

    #[test]
    fn out_of_range_pitch_is_fatal() {
        let tokens = parse("C9").unwrap();
        let err = interpret(&tokens, 4, 4).unwrap_err();
        assert!(matches!(err, NotationError::OutOfRange { what: "pitch", .. }));
    }

    #[test]
    fn out_of_range_velocity_is_fatal() {
        let tokens = parse("v128 C3 1|1").unwrap();
        let err = interpret(&tokens, 4, 4).unwrap_err();
        assert!(matches!(err, NotationError::OutOfRange { what: "velocity", .. }));
    }

    #[test]
    fn inverted_velocity_range_is_fatal() {
        let tokens = parse("v110-90 C3 1|1").unwrap();
        let err = interpret(&tokens, 4, 4).unwrap_err();
        assert!(matches!(err, NotationError::OutOfRange { what: "velocity range", .. }));
    }

    #[test]
    fn merge_view_retains_v0_marker() {
        let tokens = parse("C3 1|1 v0 C3 1|1").unwrap();
        let output = interpret_with_merge_view(&tokens, 4, 4).unwrap();
        assert_eq!(output.events.len(), 0);
        assert_eq!(output.unfiltered.len(), 2);
        assert_eq!(output.unfiltered[1].velocity, 0);
    }

    #[test]
    fn interpretation_is_deterministic() {
        let tokens = parse("C3 E3 G3 1|1 v90 D4 1|2").unwrap();
        let (a, _) = interpret(&tokens, 4, 4).unwrap();
        let (b, _) = interpret(&tokens, 4, 4).unwrap();
        assert_eq!(a, b);
    }
}
