//! Operator prompts
//!
//! All prompts read from any `BufRead` and write to any `Write` so they can be
//! driven from tests.

use crate::error::{AppResult, PsuError};
use crate::monitor::{parse_interval, MeasurementMode};
use crate::ports::PortInfo;
use log::warn;
use std::io::{BufRead, Write};
use std::time::Duration;

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> AppResult<String> {
    write!(out, "{}", question)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(PsuError::InputClosed);
    }
    Ok(line.trim().to_string())
}

/// Ask for a measurement mode until a valid one is given.
pub fn prompt_mode<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> AppResult<MeasurementMode> {
    loop {
        let answer = ask(input, out, "Measure voltage, current, or both? ")?;
        match answer.parse() {
            Ok(mode) => return Ok(mode),
            Err(_) => writeln!(out, "Please enter 'voltage', 'current', or 'both'.")?,
        }
    }
}

/// Ask for the polling interval; blank or invalid answers use `default`.
pub fn prompt_interval<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    default: Duration,
) -> AppResult<Duration> {
    let question = format!(
        "Measurement interval in seconds (default {}): ",
        default.as_secs_f64()
    );
    let answer = ask(input, out, &question)?;
    if answer.is_empty() {
        return Ok(default);
    }

    match parse_interval(&answer) {
        Some(interval) => Ok(interval),
        None => {
            warn!("Invalid interval '{}', using default", answer);
            writeln!(
                out,
                "Invalid interval. Using default of {} seconds.",
                default.as_secs_f64()
            )?;
            Ok(default)
        }
    }
}

/// Pick one of `ports`; a single candidate is chosen without asking.
///
/// Returns `None` when the list is empty.
pub fn prompt_port<'a, R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    ports: &'a [PortInfo],
) -> AppResult<Option<&'a PortInfo>> {
    match ports.len() {
        0 => return Ok(None),
        1 => return Ok(ports.first()),
        _ => {}
    }

    loop {
        let question = format!("Select a port [1-{}]: ", ports.len());
        let answer = ask(input, out, &question)?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=ports.len()).contains(&n) => return Ok(ports.get(n - 1)),
            _ => writeln!(out, "Please enter a number between 1 and {}.", ports.len())?,
        }
    }
}
