//! Parsing utilities for CLI arguments and interactive commands.
//!
//! This module provides reusable parsing functions for the primitive values
//! the input surfaces hand to a relay session.

use crate::error::{RelayError, Result};
use crate::relay::{CurveFamily, validate_current};
use crate::session::RelayInput;

// =============================================================================
// Primitive Values
// =============================================================================

/// Parse a current in amperes. Accepts an optional `A` unit and `k` multiplier.
///
/// # Example
/// ```
/// use idmt_relay_settings::utils::parsing::parse_current;
///
/// assert_eq!(parse_current("5000").unwrap(), 5000.0);
/// assert_eq!(parse_current("4.5kA").unwrap(), 4500.0);
/// assert!(parse_current("-3").is_err());
/// ```
pub fn parse_current(text: &str) -> Result<f64> {
    let lower = text.trim().to_lowercase();
    let body = lower.strip_suffix('a').unwrap_or(&lower).trim_end();

    let (number, scale) = match body.strip_suffix('k') {
        Some(rest) => (rest.trim_end(), 1000.0),
        None => (body, 1.0),
    };

    let value: f64 = number.parse().map_err(|_| RelayError::InvalidInput {
        field: "current",
        value: f64::NAN,
        reason: "Expected a number of amperes, e.g. 5000 or 4.5kA.",
    })?;

    validate_current("current", value * scale)
}

/// Parse an on/off style switch.
pub fn parse_switch(text: &str) -> Result<bool> {
    match text.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" | "adaptive" => Ok(true),
        "off" | "false" | "no" | "0" | "fixed" => Ok(false),
        other => Err(RelayError::InvalidCommand(format!(
            "Unknown switch value '{}'. Use: on or off",
            other
        ))),
    }
}

/// Parse a curve family name.
pub fn parse_curve_family(name: &str) -> Result<CurveFamily> {
    name.parse()
}

// =============================================================================
// Interactive Commands
// =============================================================================

/// A line typed into the interactive session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Change one input and recompute.
    Apply(RelayInput),
    /// Redraw without changing anything.
    Show,
    Help,
    Quit,
}

/// Parse a line such as `fault 4000`, `adaptive on` or `curve very`.
///
/// # Example
/// ```
/// use idmt_relay_settings::session::RelayInput;
/// use idmt_relay_settings::utils::parsing::{SessionCommand, parse_session_command};
///
/// let cmd = parse_session_command("load 900").unwrap();
/// assert_eq!(cmd, SessionCommand::Apply(RelayInput::LoadCurrent(900.0)));
/// ```
pub fn parse_session_command(line: &str) -> Result<SessionCommand> {
    let mut parts = line.split_whitespace();
    let keyword = parts.next().unwrap_or("").to_lowercase();
    let argument = parts.collect::<Vec<_>>().join(" ");

    match keyword.as_str() {
        "fault" | "f" => Ok(SessionCommand::Apply(RelayInput::FaultCurrent(parse_current(
            require_argument(&keyword, &argument)?,
        )?))),
        "load" | "l" => Ok(SessionCommand::Apply(RelayInput::LoadCurrent(parse_current(
            require_argument(&keyword, &argument)?,
        )?))),
        "adaptive" | "ibr" | "a" => Ok(SessionCommand::Apply(RelayInput::AdaptiveMode(
            parse_switch(require_argument(&keyword, &argument)?)?,
        ))),
        "curve" | "c" => Ok(SessionCommand::Apply(RelayInput::CurveFamily(
            parse_curve_family(require_argument(&keyword, &argument)?)?,
        ))),
        "" | "show" | "s" => Ok(SessionCommand::Show),
        "help" | "h" | "?" => Ok(SessionCommand::Help),
        "quit" | "exit" | "q" => Ok(SessionCommand::Quit),
        other => Err(RelayError::InvalidCommand(format!(
            "Unknown command '{}'. Type 'help' for the list",
            other
        ))),
    }
}

fn require_argument<'a>(keyword: &str, argument: &'a str) -> Result<&'a str> {
    if argument.is_empty() {
        return Err(RelayError::InvalidCommand(format!(
            "'{}' needs a value",
            keyword
        )));
    }
    Ok(argument)
}

// =============================================================================
// Tests
// =============================================================================
