//! Configuration validation framework

use crate::{ConfigError, ConfigResult};
use regex::Regex;
use std::time::Duration;

/// Get endpoint validation regex - returns None if regex compilation fails
///
/// Accepts `http(s)://...` URLs as well as the scheme-less `host:port[/path]`
/// form Triton clients are usually pointed at.
fn get_endpoint_regex() -> Option<&'static Regex> {
    static ENDPOINT_REGEX: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    ENDPOINT_REGEX
        .get_or_init(|| {
            Regex::new(r"^(https?://[^\s/$.?#][^\s]*|[A-Za-z0-9][A-Za-z0-9.\-]*:\d{1,5}(/[^\s]*)?)$")
                .ok()
        })
        .as_ref()
}

/// Trait for validating configuration values
pub trait Validate {
    /// Validate this configuration object
    ///
    /// # Errors
    /// Returns validation errors if the configuration is invalid
    fn validate(&self) -> ConfigResult<()>;
}

/// Validate an endpoint string
///
/// # Errors
/// Returns `ConfigError::InvalidUrl` if the endpoint format is invalid
pub fn validate_endpoint(url: &str, _field_name: &str) -> ConfigResult<()> {
    get_endpoint_regex().map_or_else(
        || {
            // If regex compilation failed, do basic validation
            if url.starts_with("http://") || url.starts_with("https://") || url.contains(':') {
                Ok(())
            } else {
                Err(ConfigError::InvalidUrl {
                    url: url.to_string(),
                })
            }
        },
        |regex| {
            if regex.is_match(url) {
                Ok(())
            } else {
                Err(ConfigError::InvalidUrl {
                    url: url.to_string(),
                })
            }
        },
    )
}

/// Validate a value is within a range
///
/// # Errors
/// Returns `ConfigError::OutOfRange` if value is outside the specified range
pub fn validate_range(value: u64, min: u64, max: u64, field_name: &str) -> ConfigResult<()> {
    if value < min || value > max {
        Err(ConfigError::OutOfRange {
            field: field_name.to_string(),
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

/// Validate a floating point value is finite and strictly positive
///
/// # Errors
/// Returns `ConfigError::Generic` for zero, negative, NaN or infinite values
pub fn validate_positive(value: f64, field_name: &str) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Generic {
            message: format!("{field_name} must be a positive number, got {value}"),
        })
    }
}

/// Validate a number of seconds and convert it to a `Duration`
///
/// # Errors
/// Returns `ConfigError::Generic` for non-positive values and for values too
/// large to be represented as a `Duration`
pub fn validate_duration_seconds(value: f64, field_name: &str) -> ConfigResult<Duration> {
    validate_positive(value, field_name)?;
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::Generic {
        message: format!("{field_name} of {value} seconds is out of range"),
    })
}

/// Validate a string is not empty
///
/// # Errors
/// Returns `ConfigError::MissingField` if the string is empty or whitespace-only
pub fn validate_non_empty(value: &str, field_name: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingField {
            field: field_name.to_string(),
        })
    } else {
        Ok(())
    }
}
