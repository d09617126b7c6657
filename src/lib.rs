//! # barbeat
//!
//! A symbolic music-notation toolchain: converts between bar|beat notation
//! text and a canonical stream of timed note events, and applies
//! declarative modulation expressions to those events.
//!
//! ## Pipeline
//!
//! ```text
//! bar|beat text -> Lexer -> Parser -> TokenStream
//!                -> interpreter -> Vec<NoteEvent>
//!                -> (optional) modulation evaluator mutates in place
//!                -> (optional) formatter -> bar|beat text
//! ```
//!
//! 1. **Lexer/Parser** ([`lexer`], [`parser`]) - tokenize and parse bar|beat
//!    source into a flat [`parser::TokenStream`].
//! 2. **Interpreter** ([`interpreter`]) - reduce the token stream to a
//!    `Vec<NoteEvent>` under a stateful emission model (pitch buffering,
//!    bar-copy tiling, v0 deletion, repeat expansion).
//! 3. **Modulation** ([`modulation`]) - parse and evaluate per-parameter
//!    expressions against the note-event sequence, mutating it in place.
//! 4. **Formatter** ([`formatter`]) - the inverse of the interpreter: a
//!    canonical re-serialization that round-trips through it exactly.
//!
//! ## Quick start
//!
//! ```rust
//! use barbeat::{notate, modulate, render};
//!
//! let (mut events, diagnostics) = notate("C3 E3 G3 1|1", 4, 4).unwrap();
//! assert!(diagnostics.is_empty());
//!
//! modulate(&mut events, "velocity += 20 * cos(1t)", 4, 4);
//!
//! let text = render(&events, 4, 4);
//! # let _ = text;
//! ```
//!
//! ## Scope
//!
//! This crate is stateless and single-threaded: every public entry point is
//! a pure function over its inputs except for `modulate`'s in-place
//! mutation of the caller's own note-event vector. It does not implement
//! audio synthesis, MIDI file I/O, score layout, undo/redo, a GUI, a CLI,
//! configuration loading, logging sinks, or the DAW bridge that would
//! persist note events to a live session — those are external
//! collaborators; this crate only defines the data contracts they observe
//! ([`note::NoteEvent`]).
//!
//! ## Module structure
//!
//! - [`time`] - coordinate conversions between musical beats, engine beats,
//!   and `bar|beat` positions.
//! - [`note`] - the canonical [`note::NoteEvent`] record and its invariants.
//! - [`lexer`], [`parser`] - bar|beat grammar: tokenizing and parsing.
//! - [`interpreter`] - the bar|beat interpreter (the hardest part: pitch
//!   buffering, bar-copy tiling, v0 deletion, repeat expansion).
//! - [`formatter`] - the bar|beat formatter, the interpreter's inverse.
//! - [`modulation`] - the modulation grammar, parser, waveform library, and
//!   evaluator.
//! - [`error`] - fatal [`error::NotationError`] and non-fatal
//!   [`error::Diagnostic`] types.
//! - [`api`] - convenience wrappers over the four pipeline stages.

pub mod api;
pub mod error;
pub mod formatter;
pub mod interpreter;
pub mod lexer;
pub mod modulation;
pub mod note;
pub mod parser;
pub mod time;

pub use api::{modulate, notate, notate_with_merge_view, render};
pub use error::{Diagnostic, DiagnosticKind, NotationError};
pub use interpreter::{interpret, interpret_with_merge_view, InterpretOutput};
pub use note::NoteEvent;
pub use parser::{parse, BarOrRange, Beat, Token, TokenStream};
