//! Request ids attached to Triton inference calls

use uuid::Uuid;

/// Id sent in the `id` field of a Triton infer request
///
/// Triton echoes it back in the response, so server-side logs can be matched
/// with the client's `debug!` line for the same batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
