//! Credentials resolved on demand
//!
//! A [`Secret`] either wraps a literal token or names environment variables
//! to read when the backend is built. Only the env-var form can be
//! serialized; a literal token would otherwise end up in plaintext in a
//! saved component definition.

use crate::{EmbeddingError, EmbeddingResult};
use nvembed_common::redact_secret;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A credential and where to find it
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    /// Literal value supplied in code
    Token(String),
    /// First set variable among `env_vars`; `strict` makes an unset result an error
    EnvVar { env_vars: Vec<String>, strict: bool },
}

/// Serialized form of a [`Secret`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretDescriptor {
    EnvVar {
        env_vars: Vec<String>,
        #[serde(default = "strict_by_default")]
        strict: bool,
    },
    Token {
        token: String,
        #[serde(default = "strict_by_default")]
        strict: bool,
    },
}

const fn strict_by_default() -> bool {
    true
}

impl Secret {
    /// Secret holding a literal token
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::Token(token.into())
    }

    /// Strict secret read from a single environment variable
    pub fn from_env_var(name: impl Into<String>) -> Self {
        Self::EnvVar {
            env_vars: vec![name.into()],
            strict: true,
        }
    }

    /// Secret read from the first set variable of `names`
    pub fn from_env_vars<I, S>(names: I, strict: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::EnvVar {
            env_vars: names.into_iter().map(Into::into).collect(),
            strict,
        }
    }

    /// Resolve the secret to its value
    ///
    /// Returns `Ok(None)` for a non-strict env-var secret whose variables are
    /// all unset.
    ///
    /// # Errors
    /// Returns `EmbeddingError::Secret` when a strict env-var secret has no
    /// variable set.
    pub fn resolve(&self) -> EmbeddingResult<Option<String>> {
        match self {
            Self::Token(token) => Ok(Some(token.clone())),
            Self::EnvVar { env_vars, strict } => {
                let found = env_vars.iter().find_map(|name| std::env::var(name).ok());
                match found {
                    Some(value) => Ok(Some(value)),
                    None if *strict => Err(EmbeddingError::Secret(format!(
                        "None of the following authentication environment variables are set: {env_vars:?}"
                    ))),
                    None => Ok(None),
                }
            }
        }
    }

    /// Descriptor used when the owning component is serialized
    ///
    /// # Errors
    /// Returns `EmbeddingError::Serialization` for token secrets.
    pub fn to_descriptor(&self) -> EmbeddingResult<SecretDescriptor> {
        match self {
            Self::Token(_) => Err(EmbeddingError::Serialization(
                "Cannot serialize token-based secret. Use an alternative secret type like environment variables."
                    .to_string(),
            )),
            Self::EnvVar { env_vars, strict } => Ok(SecretDescriptor::EnvVar {
                env_vars: env_vars.clone(),
                strict: *strict,
            }),
        }
    }

    /// Rebuild a secret from its descriptor
    ///
    /// # Errors
    /// Returns `EmbeddingError::Serialization` for an empty variable list or token.
    pub fn from_descriptor(descriptor: SecretDescriptor) -> EmbeddingResult<Self> {
        match descriptor {
            SecretDescriptor::EnvVar { env_vars, .. } if env_vars.is_empty() => Err(
                EmbeddingError::Serialization("env_var secret needs at least one variable".into()),
            ),
            SecretDescriptor::EnvVar { env_vars, strict } => Ok(Self::EnvVar { env_vars, strict }),
            SecretDescriptor::Token { token, .. } if token.is_empty() => Err(
                EmbeddingError::Serialization("token secret cannot be empty".into()),
            ),
            SecretDescriptor::Token { token, .. } => Ok(Self::Token(token)),
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(token) => f.debug_tuple("Token").field(&redact_secret(token)).finish(),
            Self::EnvVar { env_vars, strict } => f
                .debug_struct("EnvVar")
                .field("env_vars", env_vars)
                .field("strict", strict)
                .finish(),
        }
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_descriptor()
            .map_err(<S::Error as serde::ser::Error>::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let descriptor = SecretDescriptor::deserialize(deserializer)?;
        Self::from_descriptor(descriptor).map_err(serde::de::Error::custom)
    }
}
