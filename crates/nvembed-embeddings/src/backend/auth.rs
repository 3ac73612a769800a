//! Authorization header shared by the transports

use crate::{EmbeddingError, EmbeddingResult, Secret};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nvembed_common::redact::redact_authorization;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tonic::metadata::{MetadataMap, MetadataValue};

/// The `Authorization` value a backend sends with every request
///
/// Built once when the backend is constructed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders {
    authorization: Option<String>,
}

impl AuthHeaders {
    /// Resolve credentials into a header value
    ///
    /// Basic auth wins when both `username` and `password` resolve; otherwise
    /// the API key becomes a bearer token. With neither, no header is sent.
    ///
    /// # Errors
    /// Returns `EmbeddingError::Secret` when a strict secret cannot be resolved.
    pub fn from_credentials(
        api_key: Option<&Secret>,
        username: Option<&Secret>,
        password: Option<&Secret>,
    ) -> EmbeddingResult<Self> {
        if let (Some(username), Some(password)) = (username, password) {
            if let (Some(user), Some(pass)) = (username.resolve()?, password.resolve()?) {
                let encoded = STANDARD.encode(format!("{user}:{pass}"));
                return Ok(Self {
                    authorization: Some(format!("Basic {encoded}")),
                });
            }
        }

        let authorization = match api_key {
            Some(secret) => secret.resolve()?.map(|key| format!("Bearer {key}")),
            None => None,
        };
        Ok(Self { authorization })
    }

    /// Raw header value, if any
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Auth flavour for log lines
    pub fn scheme(&self) -> &'static str {
        match self.authorization.as_deref() {
            Some(value) if value.starts_with("Basic ") => "basic",
            Some(_) => "bearer",
            None => "none",
        }
    }

    /// Header map for reqwest clients, with the credential marked sensitive
    ///
    /// # Errors
    /// Returns `EmbeddingError::Validation` if the credential is not a valid header value.
    pub fn header_map(&self) -> EmbeddingResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(value) = &self.authorization {
            let mut value = HeaderValue::from_str(value).map_err(|_| {
                EmbeddingError::validation_error("credential contains characters not allowed in a header")
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Attach the credential to gRPC request metadata
    ///
    /// # Errors
    /// Returns `EmbeddingError::Validation` if the credential is not valid ASCII metadata.
    pub fn apply_metadata(&self, metadata: &mut MetadataMap) -> EmbeddingResult<()> {
        if let Some(value) = &self.authorization {
            let value = MetadataValue::try_from(value.as_str()).map_err(|_| {
                EmbeddingError::validation_error("credential contains characters not allowed in gRPC metadata")
            })?;
            metadata.insert("authorization", value);
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaders")
            .field(
                "authorization",
                &self.authorization.as_deref().map(redact_authorization),
            )
            .finish()
    }
}
