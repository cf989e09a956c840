//! Unified error types for the tierstack workspace.
//!
//! Every builder fails fast with a [`StackError`]. Failures that surface
//! through a deferred value travel as a cloneable [`OutputError`] and are
//! folded back into [`StackError::Deferred`] when awaited.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StackError {
    /// A registry authorization token could not be turned into a credential.
    #[error("invalid registry credential: {reason}")]
    InvalidCredential {
        /// Why the decoded token was rejected.
        reason: String,
    },

    /// Network inputs are malformed or incomplete.
    #[error("invalid topology: {message}")]
    Topology {
        /// Description of the malformed input.
        message: String,
    },

    /// A load balancer or service mixes public and private network resources.
    #[error("topology mismatch: {message}")]
    TopologyMismatch {
        /// Description of the tier conflict.
        message: String,
    },

    /// A referenced resource is unknown to the provider.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The cloud provider rejected or failed an operation.
    #[error("provider call {operation} failed: {message}")]
    Provider {
        /// Provider operation that failed.
        operation: &'static str,
        /// Provider-supplied failure description.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// YAML configuration could not be parsed.
    #[error("yaml error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },

    /// A deferred value this operation depended on failed.
    #[error("deferred value failed: {0}")]
    Deferred(#[from] OutputError),
}

impl StackError {
    /// Shorthand for a [`StackError::Topology`] error.
    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology {
            message: message.into(),
        }
    }

    /// Shorthand for a [`StackError::TopologyMismatch`] error.
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::TopologyMismatch {
            message: message.into(),
        }
    }

    /// Shorthand for a [`StackError::InvalidCredential`] error.
    pub fn invalid_credential(reason: impl Into<String>) -> Self {
        Self::InvalidCredential {
            reason: reason.into(),
        }
    }

    /// Returns the error that originally failed, looking through any
    /// number of deferred-value hops.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Deferred(OutputError::Upstream(inner)) => inner.root_cause(),
            other => other,
        }
    }
}

/// Failure carried by a deferred value.
///
/// Cloneable so every dependent of a failed value observes the same error.
#[derive(Debug, Clone, Error)]
pub enum OutputError {
    /// The producer was dropped before it resolved the value.
    #[error("value was abandoned before it resolved")]
    Abandoned,

    /// The producer failed with a stack error.
    #[error(transparent)]
    Upstream(Arc<StackError>),
}

impl OutputError {
    /// Returns the originating stack error, if any.
    #[must_use]
    pub fn root_cause(&self) -> Option<&StackError> {
        match self {
            Self::Abandoned => None,
            Self::Upstream(inner) => Some(inner.root_cause()),
        }
    }
}

impl From<StackError> for OutputError {
    fn from(error: StackError) -> Self {
        match error {
            StackError::Deferred(inner) => inner,
            other => Self::Upstream(Arc::new(other)),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StackError>;
