//! Filter phases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The stage of request processing a filter is bound to.
///
/// Phases always execute in declaration order: `Pre` before `Route` before
/// `Post`. The string forms (`"pre"`, `"route"`, `"post"`) are the literal
/// keys used for failure accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Runs before routing (route resolution, header shaping, auth).
    Pre,
    /// Performs the backend call and attaches the response.
    Route,
    /// Runs after the backend has responded (logging, response decoration).
    Post,
}

impl Phase {
    /// Returns the phase key used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Route => "route",
            Self::Post => "post",
        }
    }

    /// Returns all phases in execution order.
    #[must_use]
    pub const fn all() -> [Phase; 3] {
        [Self::Pre, Self::Route, Self::Post]
    }

    /// Position of this phase in execution order.
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Pre => 0,
            Self::Route => 1,
            Self::Post => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown phase name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter phase: {0}")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pre" => Ok(Self::Pre),
            "route" => Ok(Self::Route),
            "post" => Ok(Self::Post),
            _ => Err(ParsePhaseError(s.to_string())),
        }
    }
}
