//! # bar|beat formatter
//!
//! Re-serializes a `Vec<NoteEvent>` into canonical bar|beat text: the
//! inverse of [`crate::interpreter::interpret`] for any event sequence that
//! actually came from interpretation, so that formatting and
//! re-interpreting a stream recovers the same events.
//!
//! Two deliberate design choices are worth calling out: the grammar never
//! admits a `"bar:beat"` duration token, so this formatter only ever emits
//! numeric `tX` tokens; and velocity clamping is *not* performed here —
//! `NoteEvent::velocity` is already guaranteed `1..=127` by the
//! interpreter before a value ever reaches this module, so clamping here
//! would be unreachable.

use crate::note::NoteEvent;
use crate::time;

const DEFAULT_VELOCITY: u8 = 100;
const DEFAULT_DURATION: f64 = 1.0;
const DEFAULT_PROBABILITY: f64 = 1.0;
const DEFAULT_VELOCITY_DEVIATION: u8 = 0;

/// Format a note-event sequence as canonical bar|beat text.
///
/// Algorithm: stable-sort by `(start_time, pitch)`, group events at the
/// same `(bar, beat)` position, then for each group emit only the
/// state-change tokens whose value differs from the running tracked
/// state, followed by the pitch names, followed by the group's time
/// position.
pub fn format(events: &[NoteEvent], num: u32, den: u32) -> String {
    let mut sorted: Vec<NoteEvent> = events.to_vec();
    sorted.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap().then(a.pitch.cmp(&b.pitch)));

    let groups = group_by_position(&sorted, num, den);

    let mut tracked_velocity = DEFAULT_VELOCITY;
    let mut tracked_velocity_deviation = DEFAULT_VELOCITY_DEVIATION;
    let mut tracked_duration = DEFAULT_DURATION;
    let mut tracked_probability = DEFAULT_PROBABILITY;

    let mut lines = Vec::new();
    for group in &groups {
        let mut tokens = Vec::new();
        for event in &group.events {
            let duration_musical = time::round_to_millibeat(event.duration / (4.0 / den as f64));

            if event.velocity != tracked_velocity || event.velocity_deviation != tracked_velocity_deviation {
                tokens.push(format_velocity_token(event.velocity, event.velocity_deviation));
                tracked_velocity = event.velocity;
                tracked_velocity_deviation = event.velocity_deviation;
            }
            if !time::beats_eq(duration_musical, tracked_duration) {
                tokens.push(format!("t{}", time::format_beat(duration_musical)));
                tracked_duration = duration_musical;
            }
            if !time::beats_eq(event.probability, tracked_probability) {
                tokens.push(format!("p{}", format_probability(event.probability)));
                tracked_probability = event.probability;
            }
            tokens.push(pitch_to_name(event.pitch));
        }
        tokens.push(format!("{}|{}", group.bar, time::format_beat(group.beat)));
        lines.push(tokens.join(" "));
    }

    lines.join(" ")
}

struct PositionGroup {
    bar: u32,
    beat: f64,
    events: Vec<NoteEvent>,
}

fn group_by_position(sorted: &[NoteEvent], num: u32, den: u32) -> Vec<PositionGroup> {
    let mut groups: Vec<PositionGroup> = Vec::new();
    for event in sorted {
        let (bar, beat) = time::engine_beats_to_bar_beat(event.start_time, num, den);
        match groups.last_mut() {
            Some(last) if last.bar == bar && time::beats_eq(last.beat, beat) => {
                last.events.push(*event);
            }
            _ => groups.push(PositionGroup { bar, beat, events: vec![*event] }),
        }
    }
    groups
}

/// Velocity precedence: a range is emitted as `v<min>-<max>` unless
/// clamping collapses it to a single value, in which case `v<min>`.
fn format_velocity_token(velocity: u8, velocity_deviation: u8) -> String {
    if velocity_deviation > 0 {
        let min = velocity.clamp(1, 127);
        let max = (min as u16 + velocity_deviation as u16).min(127) as u8;
        if max == min {
            format!("v{}", min)
        } else {
            format!("v{}-{}", min, max)
        }
    } else {
        format!("v{}", velocity)
    }
}

fn format_probability(value: f64) -> String {
    time::format_beat(value)
}

const NATURAL_NAMES: [(&str, i32); 7] =
    [("C", 0), ("D", 2), ("E", 4), ("F", 5), ("G", 7), ("A", 9), ("B", 11)];

/// Render a MIDI pitch as `"C3"`, `"F#1"`, etc. Always spells accidentals
/// as sharps (the grammar's enharmonic flats are accepted on input but the
/// formatter need not reproduce the original spelling — only the surface
/// syntax itself, not pitch spelling, needs to round-trip).
fn pitch_to_name(pitch: u8) -> String {
    let value = pitch as i32;
    let octave = value / 12 - 2;
    let semitone = value - (octave + 2) * 12;
    for (name, offset) in NATURAL_NAMES {
        if offset == semitone {
            return format!("{}{}", name, octave);
        }
    }
    let (name, offset) = NATURAL_NAMES.iter().rev().find(|&&(_, o)| o < semitone).unwrap();
    format!("{}#{}", name, octave)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpret;
    use crate::parser::parse;

    fn note(pitch: u8, start: f64, duration: f64, velocity: u8, velocity_deviation: u8, probability: f64) -> NoteEvent {
        NoteEvent { pitch, start_time: start, duration, velocity, velocity_deviation, probability }
    }

    #[test]
    fn pitch_names_roundtrip_naturals() {
        assert_eq!(pitch_to_name(0), "C-2");
        assert_eq!(pitch_to_name(60), "C3");
        assert_eq!(pitch_to_name(127), "G8");
    }

    #[test]
    fn pitch_names_use_sharps_for_black_keys() {
        assert_eq!(pitch_to_name(61), "C#3");
        assert_eq!(pitch_to_name(66), "F#3");
    }

    #[test]
    fn formats_chord_with_default_state_only_position_token() {
        let events = vec![note(60, 0.0, 1.0, 100, 0, 1.0), note(64, 0.0, 1.0, 100, 0, 1.0), note(67, 0.0, 1.0, 100, 0, 1.0)];
        assert_eq!(format(&events, 4, 4), "C3 E3 G3 1|1");
    }

    #[test]
    fn emits_state_tokens_only_on_change() {
        let events = vec![note(72, 0.0, 1.0, 100, 0, 1.0), note(72, 1.0, 1.0, 90, 0, 1.0)];
        assert_eq!(format(&events, 4, 4), "C4 1|1 v90 C4 1|2");
    }

    #[test]
    fn velocity_range_emits_min_max_and_collapses_when_clamped() {
        let events = vec![note(60, 0.0, 1.0, 90, 20, 1.0)];
        assert_eq!(format(&events, 4, 4), "v90-110 C3 1|1");

        let events = vec![note(60, 0.0, 1.0, 127, 10, 1.0)];
        assert_eq!(format(&events, 4, 4), "v127 C3 1|1");
    }

    #[test]
    fn interpret_format_interpret_round_trips() {
        let source = "v100 C4 1|1 v90 |2 t2 D4 1|3";
        let tokens = parse(source).unwrap();
        let (events, _) = interpret(&tokens, 4, 4).unwrap();

        let formatted = format(&events, 4, 4);
        let tokens2 = parse(&formatted).unwrap();
        let (events2, _) = interpret(&tokens2, 4, 4).unwrap();

        let sort = |mut v: Vec<NoteEvent>| {
            v.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap().then(a.pitch.cmp(&b.pitch)));
            v
        };
        assert_eq!(sort(events), sort(events2));
    }
}
