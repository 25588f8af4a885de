//! Command grammar for scheduled tasks
//!
//! The manager stores commands as free strings. The client parses them once,
//! when a task is ingested, into a tagged [`Command`]; execution is an
//! exhaustive match in [`runner`]. A string matching no rule parses to
//! [`Command::Unrecognized`], which still carries the raw text for the error
//! message and the manager-side task history.

pub mod runner;

use regex::Regex;
use std::sync::LazyLock;

static PUMP_TO_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pump (\d+)ml to (.+)$").expect("pattern compiles"));

static PUMP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pump (\d+)ml$").expect("pattern compiles"));

/// A parsed task command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Hold the executor for the configured dwell without touching hardware
    DoNothing,
    /// Pump straight down the main line
    PumpVolume { millilitres: u32 },
    /// Move the diverter to a named plant, pump, wait for drain
    PumpVolumeWithTarget { millilitres: u32, target: String },
    /// The raw string matched no rule (or its volume overflowed)
    Unrecognized(String),
}

impl Command {
    /// Parse a command string. Whole-string match after trimming; a volume
    /// that does not fit `u32` makes the command unrecognized rather than
    /// saturating.
    pub fn parse(raw: &str) -> Command {
        let trimmed = raw.trim();

        if trimmed == "do nothing" {
            return Command::DoNothing;
        }

        if let Some(captures) = PUMP_TO_PATTERN.captures(trimmed) {
            if let Ok(millilitres) = captures[1].parse::<u32>() {
                return Command::PumpVolumeWithTarget {
                    millilitres,
                    target: captures[2].to_string(),
                };
            }
        }

        if let Some(captures) = PUMP_PATTERN.captures(trimmed) {
            if let Ok(millilitres) = captures[1].parse::<u32>() {
                return Command::PumpVolume { millilitres };
            }
        }

        Command::Unrecognized(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_with_target_captures_volume_and_name() {
        assert_eq!(
            Command::parse("pump 50ml to Roberto"),
            Command::PumpVolumeWithTarget {
                millilitres: 50,
                target: "Roberto".into()
            }
        );
    }

    #[test]
    fn plain_pump_captures_volume() {
        assert_eq!(
            Command::parse("pump 120ml"),
            Command::PumpVolume { millilitres: 120 }
        );
    }

    #[test]
    fn do_nothing_parses() {
        assert_eq!(Command::parse("do nothing"), Command::DoNothing);
        assert_eq!(Command::parse("  do nothing  "), Command::DoNothing);
    }

    #[test]
    fn unknown_strings_are_unrecognized() {
        assert_eq!(
            Command::parse("water the lawn"),
            Command::Unrecognized("water the lawn".into())
        );
        // partial matches must not dispatch
        assert!(matches!(
            Command::parse("pump 50ml to"),
            Command::Unrecognized(_)
        ));
        assert!(matches!(Command::parse("pump ml"), Command::Unrecognized(_)));
    }

    #[test]
    fn overflowing_volume_is_unrecognized() {
        assert!(matches!(
            Command::parse("pump 99999999999ml"),
            Command::Unrecognized(_)
        ));
    }
}
