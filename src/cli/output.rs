//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::error::{CommandError, Error, Result};
use crate::sampler::{MAX_RAND, boom_probability};
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Outcome of a single `spin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpinReport {
    /// Device name.
    pub device: String,
    /// Whether the open survived.
    pub survived: bool,
    /// Sampled value.
    pub sampled: u8,
    /// Chance at open.
    pub chance: u8,
    /// Text read from the device (empty on a boom).
    pub message: String,
    /// Number of non-empty reads it took.
    pub reads: usize,
}

/// Device status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Device name.
    pub device: String,
    /// Assigned major number.
    pub major: u32,
    /// Current chance.
    pub chance: u8,
    /// Largest chance accepted.
    pub max_chance: u8,
    /// Active users.
    pub users: usize,
}

/// Tally of a `simulate` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    /// Device name.
    pub device: String,
    /// Chance used.
    pub chance: u8,
    /// Opens attempted.
    pub opens: usize,
    /// Opens that survived.
    pub survived: usize,
    /// Opens that went boom.
    pub booms: usize,
    /// Bytes read across all surviving sessions.
    pub bytes_read: usize,
    /// Users left once every session was released.
    pub users_after: usize,
}

/// Formats a spin outcome.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON serialization fails.
pub fn format_spin(report: &SpinReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            if report.survived {
                Ok(report.message.clone())
            } else {
                Ok(format!(
                    "Boom! sampled value is {}, which is < {}\n",
                    report.sampled, report.chance
                ))
            }
        }
        OutputFormat::Json => format_json(report),
    }
}

/// Formats a device status.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON serialization fails.
pub fn format_status(report: &StatusReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str("kernel-roulette Status\n");
            output.push_str("======================\n\n");
            let _ = writeln!(output, "  Device:        {}", report.device);
            let _ = writeln!(output, "  Major:         {}", report.major);
            let _ = writeln!(
                output,
                "  Chance:        {}/{}",
                report.chance, report.max_chance
            );
            let _ = writeln!(output, "  Users:         {}", report.users);
            let _ = writeln!(
                output,
                "  Node:          /bin/mknod /dev/{} c {} 0",
                report.device, report.major
            );
            Ok(output)
        }
        OutputFormat::Json => format_json(report),
    }
}

/// Formats the chance and its boom probability.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON serialization fails.
pub fn format_chance(chance: u8, updated: bool, format: OutputFormat) -> Result<String> {
    let probability = boom_probability(chance);
    match format {
        OutputFormat::Text => {
            let verb = if updated { "set to" } else { "is" };
            Ok(format!(
                "Chance {verb} {chance}/{MAX_RAND} ({:.0}% boom probability)\n",
                probability * 100.0
            ))
        }
        OutputFormat::Json => format_json(&serde_json::json!({
            "chance": chance,
            "max_chance": MAX_RAND,
            "probability": probability,
            "updated": updated,
        })),
    }
}

/// Formats a simulation tally.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON serialization fails.
#[allow(clippy::cast_precision_loss)]
pub fn format_simulation(report: &SimulationReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(
                output,
                "Simulated {} opens on {} (chance {}/{MAX_RAND})",
                report.opens, report.device, report.chance
            );
            let rate = if report.opens == 0 {
                0.0
            } else {
                report.survived as f64 / report.opens as f64 * 100.0
            };
            let _ = writeln!(output, "  Survived:      {} ({rate:.1}%)", report.survived);
            let _ = writeln!(output, "  Boom:          {}", report.booms);
            let _ = writeln!(output, "  Bytes read:    {}", report.bytes_read);
            let _ = writeln!(output, "  Users after:   {}", report.users_after);
            Ok(output)
        }
        OutputFormat::Json => format_json(report),
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(err: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => err.to_string(),
        OutputFormat::Json => format_json(&serde_json::json!({
            "error": err.to_string(),
            "errno": err.errno(),
            "fatal": err.is_fatal(),
        }))
        .unwrap_or_else(|_| err.to_string()),
    }
}

fn format_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(value).map_err(CommandError::from)?;
    Ok(json)
}
