//! Feature states shared by both engines.
//!
//! Block features know all three states; version features only ever persist
//! ON or OFF (DEV is meaningless for a whole-file variant).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The toggle state of a feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum State {
    /// The feature branch is materialised.
    #[serde(rename = "ON")]
    On,
    /// The default branch is materialised.
    #[serde(rename = "OFF")]
    Off,
    /// Both branches are materialised in place (blocks engine only).
    #[serde(rename = "DEV")]
    Dev,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "ON"),
            Self::Off => write!(f, "OFF"),
            Self::Dev => write!(f, "DEV"),
        }
    }
}

impl FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            "DEV" => Ok(Self::Dev),
            other => Err(format!("unknown state '{other}', expected ON, OFF or DEV")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(State::On.to_string(), "ON");
        assert_eq!(State::Off.to_string(), "OFF");
        assert_eq!(State::Dev.to_string(), "DEV");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("on".parse::<State>().unwrap(), State::On);
        assert_eq!("DEV".parse::<State>().unwrap(), State::Dev);
        assert!("blue".parse::<State>().is_err());
    }

    #[test]
    fn serde_uses_upper_case_tokens() {
        assert_eq!(serde_json::to_string(&State::Dev).unwrap(), "\"DEV\"");
        let back: State = serde_json::from_str("\"OFF\"").unwrap();
        assert_eq!(back, State::Off);
    }
}
