//! # Waveform function library
//!
//! The six functions callable from a modulation expression. Each takes a
//! phase already reduced to `[0, 1)` by the caller — see [`super::eval`]
//! for how a call's `period`/`phaseOffset` arguments become that phase.

use crate::error::NotationError;
use rand::Rng;

/// `cos(φ) = cos(2π·φ)`: `1` at `φ=0`, `0` at `φ=0.25`, `-1` at `φ=0.5`.
pub fn cos(phase: f64) -> f64 {
    (phase * std::f64::consts::TAU).cos()
}

/// `tri(φ)`: `1` at `φ=0`, linear down to `-1` at `φ=0.5`, linear back up
/// to `1` at `φ=1`.
pub fn tri(phase: f64) -> f64 {
    if phase <= 0.5 {
        1.0 - 4.0 * phase
    } else {
        -3.0 + 4.0 * phase
    }
}

/// `saw(φ) = 1 - 2φ`: `1` at `φ=0`, falling to `-1` just before `φ=1`,
/// then wrapping back to `1`.
pub fn saw(phase: f64) -> f64 {
    1.0 - 2.0 * phase
}

/// `square(φ, pulseWidth) = 1 if φ < pulseWidth else -1`.
pub fn square(phase: f64, pulse_width: f64) -> f64 {
    if phase < pulse_width {
        1.0
    } else {
        -1.0
    }
}

/// `noise()`: a fresh uniform random value in `[-1, 1]` on every call —
/// not a function of phase or position at all, so repeated evaluation
/// (even at the same note) is not deterministic.
pub fn noise() -> f64 {
    rand::thread_rng().gen_range(-1.0..=1.0)
}

/// `ramp(start, end[, speed]) = start + (end-start) * ((φ·speed) mod 1)`,
/// where `φ` is the note's fractional position within the *active time
/// range* (not a period) — computed by the caller and passed in here.
pub fn ramp(args: &[f64], phase: f64) -> Result<f64, NotationError> {
    if args.len() < 2 {
        return Err(NotationError::RampMissingBounds);
    }
    let start = args[0];
    let end = args[1];
    let speed = if args.len() >= 3 { args[2] } else { 1.0 };
    if speed <= 0.0 {
        return Err(NotationError::RampNonPositiveSpeed);
    }
    let t = (phase * speed).rem_euclid(1.0);
    Ok(start + (end - start) * t)
}

/// Validates a period argument shared by `cos`/`tri`/`saw`/`square`.
pub fn validate_period(period: f64) -> Result<(), NotationError> {
    if period <= 0.0 {
        Err(NotationError::NonPositivePeriod)
    } else {
        Ok(())
    }
}
