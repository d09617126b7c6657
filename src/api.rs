//! # Public API
//!
//! Thin convenience wrappers over the four pipeline stages (lex+parse,
//! interpret, modulate, format) for callers that don't need to reach into
//! the individual modules. Every function here is a pure composition of
//! calls already exposed by [`crate::parser`], [`crate::interpreter`],
//! [`crate::modulation`], and [`crate::formatter`] — nothing new happens
//! here beyond threading `(num, den)` through.
//!
//! ## Typical usage
//!
//! ```rust
//! use barbeat::notate;
//!
//! let (events, diagnostics) = notate("C3 E3 G3 1|1", 4, 4).unwrap();
//! assert_eq!(events.len(), 3);
//! assert!(diagnostics.is_empty());
//! ```
//!
//! Applying a modulation and re-rendering the result:
//!
//! ```rust
//! use barbeat::{notate, modulate, render};
//!
//! let (mut events, _) = notate("C3 1|1 C3 1|2 C3 1|3", 4, 4).unwrap();
//! modulate(&mut events, "velocity += 10 * cos(1t)", 4, 4);
//! let text = render(&events, 4, 4);
//! assert!(text.contains("1|1"));
//! ```

use crate::error::{Diagnostic, NotationError};
use crate::formatter;
use crate::interpreter::{self, InterpretOutput};
use crate::modulation;
use crate::note::NoteEvent;
use crate::parser;

/// Parse and interpret a bar|beat source string into its note-event
/// sequence (v0 deletion markers already applied and removed) plus any
/// non-fatal diagnostics raised along the way.
///
/// This is the common-case entry point; see [`notate_with_merge_view`] for
/// the one case (an external clip updater's merge mode) that needs the
/// pre-filter view instead.
pub fn notate(source: &str, num: u32, den: u32) -> Result<(Vec<NoteEvent>, Vec<Diagnostic>), NotationError> {
    let tokens = parser::parse(source)?;
    interpreter::interpret(&tokens, num, den)
}

/// Parse and interpret a bar|beat source string, returning both the
/// filtered and unfiltered (pre-v0-deletion) note-event views.
pub fn notate_with_merge_view(source: &str, num: u32, den: u32) -> Result<InterpretOutput, NotationError> {
    let tokens = parser::parse(source)?;
    interpreter::interpret_with_merge_view(&tokens, num, den)
}

/// Apply a modulation program to `notes` in place. Never fails the caller:
/// a parse failure or a per-assignment evaluation failure both surface as
/// a [`Diagnostic`] and leave the unaffected notes untouched.
pub fn modulate(notes: &mut Vec<NoteEvent>, modulation_src: &str, num: u32, den: u32) -> Vec<Diagnostic> {
    modulation::apply_modulations(notes, modulation_src, num, den)
}

/// Re-serialize a note-event sequence as canonical bar|beat text.
pub fn render(events: &[NoteEvent], num: u32, den: u32) -> String {
    formatter::format(events, num, den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notate_parses_and_interprets_in_one_call() {
        let (events, diagnostics) = notate("C3 E3 G3 1|1", 4, 4).unwrap();
        assert_eq!(events.len(), 3);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn notate_propagates_fatal_parse_errors() {
        let err = notate("C9 1|1", 4, 4).unwrap_err();
        assert!(matches!(err, NotationError::OutOfRange { what: "pitch", .. }));
    }

    #[test]
    fn modulate_then_render_round_trips_through_notate() {
        let (mut events, _) = notate("C3 1|1", 4, 4).unwrap();
        modulate(&mut events, "velocity = 80", 4, 4);
        let text = render(&events, 4, 4);
        assert_eq!(text, "v80 C3 1|1");

        let (events2, _) = notate(&text, 4, 4).unwrap();
        assert_eq!(events2[0].velocity, 80);
    }

    #[test]
    fn notate_with_merge_view_exposes_v0_markers() {
        let output = notate_with_merge_view("C3 1|1 v0 C3 1|1", 4, 4).unwrap();
        assert!(output.events.is_empty());
        assert_eq!(output.unfiltered.len(), 2);
    }
}
