//! # Modulation evaluator
//!
//! `apply_modulations` mutates a note-event vector in place. Unlike the
//! bar|beat interpreter, nothing here is fatal: a source that fails to
//! parse aborts the whole block, and an assignment whose expression fails
//! to evaluate is skipped — both surface only as a [`Diagnostic`], never
//! as a propagated `Result`, since a modulation program is meant to abort
//! with a warning or skip a bad assignment and keep going rather than
//! stop the caller cold.

use crate::error::{Diagnostic, DiagnosticKind};
use crate::note::{NoteEvent, MIN_DURATION};
use crate::time;

use super::parser::{self, BinOp, ExprNode, ModulationAssignment, Operator, Parameter, TimeRange, Variable};
use super::waveform;

/// Mutate `notes` in place according to `modulation_src`. Always returns
/// (never fails the caller): a parse failure or a per-assignment
/// evaluation failure both surface as a [`Diagnostic`] and leave the
/// unaffected notes untouched.
pub fn apply_modulations(notes: &mut Vec<NoteEvent>, modulation_src: &str, num: u32, den: u32) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let assignments = match parser::parse(modulation_src) {
        Ok(assignments) => assignments,
        Err(err) => {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ModulationParseFailure,
                format!("modulation source failed to parse, no modulations applied: {}", err),
            ));
            return diagnostics;
        }
    };

    if notes.is_empty() || assignments.is_empty() {
        return diagnostics;
    }

    let clip_range = clip_time_range(notes, den);
    let mut current_pitch_range: Option<(u8, u8)> = None;

    for assignment in &assignments {
        if let Some(range) = assignment.pitch_range {
            current_pitch_range = Some(range);
        }

        let active_range = match assignment.time_range {
            Some(tr) => time_range_to_musical(tr, num),
            None => clip_range,
        };

        for note in notes.iter_mut() {
            if let Some((lo, hi)) = current_pitch_range {
                if note.pitch < lo || note.pitch > hi {
                    continue;
                }
            }

            let position = time::engine_beats_to_musical_beats(note.start_time, den);

            if let Some(tr) = assignment.time_range {
                if !within_time_range(position, tr, num) {
                    continue;
                }
            }

            let ctx = EvalContext { position, num, den, active_range, note: *note };
            match eval_expr(&assignment.expression, &ctx) {
                Ok(value) => apply_parameter(note, assignment.parameter, assignment.operator, value),
                Err(err) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ModulationEvalFailure,
                        format!("modulation assignment failed to evaluate, skipped: {}", err),
                    ));
                    continue;
                }
            }
        }
    }

    diagnostics
}

/// `[first.start_time * den/4, (last.start_time + last.duration) * den/4]`
/// in musical beats, where "first"/"last" mean the earliest-starting and
/// latest-ending notes in the batch, not literal vector order.
fn clip_time_range(notes: &[NoteEvent], den: u32) -> (f64, f64) {
    let start = notes.iter().map(|n| n.start_time).fold(f64::INFINITY, f64::min);
    let end = notes.iter().map(|n| n.start_time + n.duration).fold(f64::NEG_INFINITY, f64::max);
    (time::engine_beats_to_musical_beats(start, den), time::engine_beats_to_musical_beats(end, den))
}

/// A `timeRange`'s bounds, converted to musical beats using the same
/// linear position formula as `(bar, beat)` elsewhere in the crate.
fn time_range_to_musical(tr: TimeRange, num: u32) -> (f64, f64) {
    let start = (tr.start_bar as f64 - 1.0) * num as f64 + (tr.start_beat - 1.0);
    let end = (tr.end_bar as f64 - 1.0) * num as f64 + (tr.end_beat - 1.0);
    (start, end)
}

fn within_time_range(position: f64, tr: TimeRange, num: u32) -> bool {
    let (start, end) = time_range_to_musical(tr, num);
    position >= start - time::EPSILON && position <= end + time::EPSILON
}

struct EvalContext {
    position: f64,
    num: u32,
    den: u32,
    active_range: (f64, f64),
    note: NoteEvent,
}

fn eval_expr(node: &ExprNode, ctx: &EvalContext) -> Result<f64, crate::error::NotationError> {
    match node {
        ExprNode::Number(n) => Ok(*n),
        ExprNode::Period { bars, beats } => Ok(*bars as f64 * ctx.num as f64 + beats),
        ExprNode::Variable(v) => Ok(match v {
            Variable::Pitch => ctx.note.pitch as f64,
            Variable::Start => ctx.note.start_time,
            Variable::Velocity => ctx.note.velocity as f64,
            Variable::VelocityDeviation => ctx.note.velocity_deviation as f64,
            Variable::Duration => ctx.note.duration,
            Variable::Probability => ctx.note.probability,
        }),
        ExprNode::BinOp { op, left, right } => {
            let l = eval_expr(left, ctx)?;
            let r = eval_expr(right, ctx)?;
            Ok(match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => {
                    if r == 0.0 {
                        0.0
                    } else {
                        l / r
                    }
                }
            })
        }
        ExprNode::Call { name, args } => eval_call(name, args, ctx),
    }
}

fn eval_call(name: &str, args: &[ExprNode], ctx: &EvalContext) -> Result<f64, crate::error::NotationError> {
    match name {
        "cos" | "tri" | "saw" | "square" => {
            let period = if args.is_empty() { 0.0 } else { eval_expr(&args[0], ctx)? };
            waveform::validate_period(period)?;
            let offset = if args.len() >= 2 { eval_expr(&args[1], ctx)? } else { 0.0 };
            let phase = (ctx.position / period + offset).rem_euclid(1.0);
            Ok(match name {
                "cos" => waveform::cos(phase),
                "tri" => waveform::tri(phase),
                "saw" => waveform::saw(phase),
                "square" => {
                    let pulse_width = if args.len() >= 3 { eval_expr(&args[2], ctx)? } else { 0.5 };
                    waveform::square(phase, pulse_width)
                }
                _ => unreachable!(),
            })
        }
        "noise" => Ok(waveform::noise()),
        "ramp" => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, ctx)?);
            }
            let (start, end) = ctx.active_range;
            let span = end - start;
            let phase = if span == 0.0 { 0.0 } else { (ctx.position - start) / span };
            waveform::ramp(&values, phase)
        }
        other => Err(crate::error::NotationError::UnknownIdentifier { name: other.to_string() }),
    }
}

fn apply_parameter(note: &mut NoteEvent, parameter: Parameter, operator: Operator, value: f64) {
    match parameter {
        Parameter::Velocity => {
            let raw = match operator {
                Operator::Add => note.velocity as f64 + value,
                Operator::Set => value,
            };
            let clamped = raw.round().clamp(1.0, 127.0) as u8;
            note.velocity = clamped;
            note.velocity_deviation = note.velocity_deviation.min(127u8.saturating_sub(note.velocity));
        }
        Parameter::Timing => {
            note.start_time = match operator {
                Operator::Add => note.start_time + value,
                Operator::Set => value,
            };
        }
        Parameter::Duration => {
            let raw = match operator {
                Operator::Add => note.duration + value,
                Operator::Set => value,
            };
            note.duration = raw.max(MIN_DURATION);
        }
        Parameter::Probability => {
            let raw = match operator {
                Operator::Add => note.probability + value,
                Operator::Set => value,
            };
            note.probability = raw.clamp(0.0, 1.0);
        }
    }
}
