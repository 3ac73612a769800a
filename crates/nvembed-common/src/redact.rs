//! Credential redaction for logs and `Debug` output
//!
//! API keys and passwords must never reach a log line. These helpers keep
//! just enough of a value to tell two credentials apart.

/// Number of leading characters kept visible
const VISIBLE_PREFIX: usize = 4;

/// Mask a secret value, keeping a short prefix for identification
///
/// Values of up to eight characters are fully masked.
pub fn redact_secret(value: &str) -> String {
    let length = value.chars().count();
    if length <= VISIBLE_PREFIX * 2 {
        return "****".to_string();
    }
    let prefix: String = value.chars().take(VISIBLE_PREFIX).collect();
    format!("{prefix}****")
}

/// Mask the credential part of an `Authorization` header value
///
/// `"Bearer nvapi-123456"` becomes `"Bearer nvap****"`; the scheme stays
/// readable so logs still show which auth flavour was used.
pub fn redact_authorization(header: &str) -> String {
    match header.split_once(' ') {
        Some((scheme, credential)) => format!("{scheme} {}", redact_secret(credential)),
        None => redact_secret(header),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_values_fully_masked() {
        assert_eq!(redact_secret("abc"), "****");
        assert_eq!(redact_secret("12345678"), "****");
    }

    #[test]
    fn test_long_values_keep_prefix() {
        let redacted = redact_secret("nvapi-super-secret-key");
        assert_eq!(redacted, "nvap****");
        assert!(!redacted.contains("secret"));
    }

    #[test]
    fn test_authorization_scheme_stays_visible() {
        assert_eq!(
            redact_authorization("Bearer nvapi-123456789"),
            "Bearer nvap****"
        );
        assert_eq!(redact_authorization("Basic dXNlcjpwYXNz"), "Basic dXNl****");
    }
}
