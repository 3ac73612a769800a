//! Input truncation policy for the NIM transport

use crate::EmbeddingError;
use serde::{Deserialize, Deserializer, Serialize};

/// How the service handles inputs longer than the model's context
///
/// Leaving the mode unset (`None` at the call sites) keeps the model default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmbeddingTruncateMode {
    /// Drop tokens from the start of the input
    Start,
    /// Drop tokens from the end of the input
    End,
    /// Reject over-long inputs
    None,
}

impl std::fmt::Display for EmbeddingTruncateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::End => "END",
            Self::None => "NONE",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for EmbeddingTruncateMode {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "START" => Ok(Self::Start),
            "END" => Ok(Self::End),
            "NONE" => Ok(Self::None),
            _ => Err(EmbeddingError::Validation(format!(
                "Unknown truncation mode '{s}'. Supported modes are: START, END, NONE"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for EmbeddingTruncateMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
