//! Common utilities and patterns shared across nvembed crates
//!
//! This crate provides shared functionality to reduce duplication across
//! the various nvembed components: error conversions, process initialization,
//! correlation ids and credential redaction.

pub mod correlation;
pub mod error;
pub mod init;
pub mod redact;

pub use correlation::CorrelationId;
pub use error::CommonError;
pub use redact::redact_secret;
