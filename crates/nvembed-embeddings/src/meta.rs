//! Per-call metadata returned alongside embeddings

use serde::{Deserialize, Serialize};

/// Token usage reported by a transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl std::ops::Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

/// Metadata attached to an embedding result
///
/// `usage` is absent for transports that do not report token counts
/// (Triton); it serializes as `{}` in that case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl EmbeddingMeta {
    /// Metadata carrying the given usage counters
    pub const fn with_usage(prompt_tokens: u64, total_tokens: u64) -> Self {
        Self {
            usage: Some(Usage {
                prompt_tokens,
                total_tokens,
            }),
        }
    }

    /// Combine the metadata of two batches
    ///
    /// Counters are summed field by field; a side without usage contributes
    /// zero. The result has no usage only when neither side reported any.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let usage = match (self.usage, other.usage) {
            (None, None) => None,
            (left, right) => Some(left.unwrap_or_default() + right.unwrap_or_default()),
        };
        Self { usage }
    }
}
