//! Error types for pickup-core.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors that can arise from configuration and override-table operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.pickup/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}; run `pickup config init` first")]
    ConfigNotFound { path: PathBuf },

    /// A value was readable but not acceptable.
    #[error("invalid configuration in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Which remote system a [`RemoteError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteSystem {
    Source,
    Target,
}

impl fmt::Display for RemoteSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSystem::Source => write!(f, "source"),
            RemoteSystem::Target => write!(f, "target"),
        }
    }
}

/// A business-rule error the Target System embeds in an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Vec<String>,
    pub message: String,
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field.join("."), self.message)
        }
    }
}

/// Failure of a single remote call, as it crosses a port boundary.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// No usable bearer token for the system.
    #[error("no credential available for the {0} system")]
    CredentialMissing(RemoteSystem),

    /// Network failure, timeout, or a GraphQL transport-level `errors` payload.
    #[error("{system} transport error: {message}")]
    Transport {
        system: RemoteSystem,
        message: String,
    },

    /// Non-success HTTP status.
    #[error("{system} returned HTTP {status}: {body}")]
    Http {
        system: RemoteSystem,
        status: u16,
        body: String,
    },

    /// `userErrors` reported by the Target System; not retried within a tick.
    #[error("{operation} rejected: {}", join_user_errors(.errors))]
    BusinessRule {
        operation: &'static str,
        errors: Vec<UserError>,
    },

    /// The addressed record does not exist (archived, deleted, stale reference).
    #[error("{system} record not found: {what}")]
    NotFound { system: RemoteSystem, what: String },

    /// Response body did not have the expected shape.
    #[error("{system} response could not be decoded: {message}")]
    Decode {
        system: RemoteSystem,
        message: String,
    },
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

fn join_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
