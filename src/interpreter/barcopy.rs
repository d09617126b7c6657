//! Bar copy & tiling arithmetic, isolated from the state machine because
//! it is the densest pure-arithmetic piece of the interpreter.

use std::collections::HashMap;

use crate::note::NoteEvent;
use crate::parser::BarOrRange;
use crate::time;

/// Per-bar memory: bar number -> `(relative offset within the bar in
/// engine beats, NoteEvent)`. A direct map from bar number to a list of
/// bar-relative offsets rather than a mirrored object graph of each note
/// plus its original bar.
pub type BarMemory = HashMap<u32, Vec<(f64, NoteEvent)>>;

/// Record a freshly emitted note against its bar, so a later `@DEST=SRC`
/// can find it.
pub fn record(memory: &mut BarMemory, bar: u32, bar_start_engine_beats: f64, event: NoteEvent) {
    let relative = event.start_time - bar_start_engine_beats;
    memory.entry(bar).or_default().push((relative, event));
}

fn bar_length_engine_beats(num: u32, den: u32) -> f64 {
    time::bar_beat_to_engine_beats(2, 1, num, den) - time::bar_beat_to_engine_beats(1, 1, num, den)
}

/// Apply one `@DEST=SRC` operation. Returns the newly produced note
/// events, in ascending destination-bar order, each also recorded back
/// into `memory` under its destination bar so a later copy can chain off it.
///
/// `current_bar` supplies the default source when `source` is omitted:
/// it then defaults to the current bar.
pub fn apply_bar_copy(
    memory: &mut BarMemory,
    destination: BarOrRange,
    source: Option<BarOrRange>,
    current_bar: u32,
    num: u32,
    den: u32,
) -> Vec<NoteEvent> {
    let bar_length = bar_length_engine_beats(num, den);
    let (src_start, span) = match source {
        Some(BarOrRange::Range(s, e)) => (s, e - s + 1),
        Some(BarOrRange::Single(s)) => (s, 1),
        None => (current_bar, 1),
    };

    let mut produced = Vec::new();
    for dest_bar in destination.start()..=destination.end() {
        let source_bar = if span > 1 {
            src_start + ((dest_bar - destination.start()) % span)
        } else {
            src_start
        };
        let shift = (dest_bar as i64 - source_bar as i64) as f64 * bar_length;
        let dest_bar_start = time::bar_beat_to_engine_beats(dest_bar, 1.0, num, den);

        let source_events = memory.get(&source_bar).cloned().unwrap_or_default();
        for (_, event) in source_events {
            let mut copied = event;
            copied.start_time = event.start_time + shift;
            produced.push(copied);
            record(memory, dest_bar, dest_bar_start, copied);
        }
    }
    produced
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, start: f64) -> NoteEvent {
        NoteEvent { pitch, start_time: start, duration: 1.0, velocity: 100, velocity_deviation: 0, probability: 1.0 }
    }

    #[test]
    fn single_bar_copy_shifts_by_bar_length() {
        let mut mem = BarMemory::new();
        record(&mut mem, 1, 0.0, note(60, 0.0));
        record(&mut mem, 1, 0.0, note(64, 0.5));

        let copied = apply_bar_copy(&mut mem, BarOrRange::Single(2), Some(BarOrRange::Single(1)), 1, 4, 4);

        assert_eq!(copied.len(), 2);
        assert_eq!(copied[0].start_time, 4.0);
        assert_eq!(copied[1].start_time, 4.5);
    }

    #[test]
    fn range_destination_single_source_tiles_every_bar() {
        let mut mem = BarMemory::new();
        record(&mut mem, 1, 0.0, note(60, 0.0));

        let copied = apply_bar_copy(&mut mem, BarOrRange::Range(2, 4), Some(BarOrRange::Single(1)), 1, 4, 4);

        assert_eq!(copied.iter().map(|e| e.start_time).collect::<Vec<_>>(), vec![4.0, 8.0, 12.0]);
    }

    #[test]
    fn range_destination_range_source_tiles_by_modulo() {
        let mut mem = BarMemory::new();
        record(&mut mem, 1, 0.0, note(60, 0.0));
        record(&mut mem, 2, 4.0, note(62, 4.0));

        // dest 3..6, src 1..2 (span 2): dest 3 <- src 1, dest 4 <- src 2, dest 5 <- src 1, dest 6 <- src 2
        let copied = apply_bar_copy(&mut mem, BarOrRange::Range(3, 6), Some(BarOrRange::Range(1, 2)), 1, 4, 4);

        assert_eq!(copied.len(), 4);
        assert_eq!(copied[0].pitch, 60);
        assert_eq!(copied[0].start_time, 8.0); // bar 3 start
        assert_eq!(copied[1].pitch, 62);
        assert_eq!(copied[1].start_time, 12.0); // bar 4 start
        assert_eq!(copied[2].pitch, 60);
        assert_eq!(copied[2].start_time, 16.0); // bar 5 start
        assert_eq!(copied[3].pitch, 62);
        assert_eq!(copied[3].start_time, 20.0); // bar 6 start
    }

    #[test]
    fn omitted_source_defaults_to_current_bar() {
        let mut mem = BarMemory::new();
        record(&mut mem, 3, 8.0, note(60, 8.0));

        let copied = apply_bar_copy(&mut mem, BarOrRange::Single(5), None, 3, 4, 4);

        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].start_time, 16.0);
    }
}
