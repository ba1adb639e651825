//! Error types for the receptionist engine.
//!
//! Each layer owns a `thiserror` enum. [`ProviderError`] carries the
//! retry classification the fallback chain relies on; everything else is
//! absorbed by the engine before it reaches the transport.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result alias for the CLI and storage surfaces.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the CLI surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Command failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// One failed attempt inside a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    /// Provider name (e.g. `"openai"`).
    pub provider: String,
    /// Model that was requested.
    pub model: String,
    /// Error message reported for the attempt.
    pub message: String,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.provider, self.model, self.message)
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn summarize(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by AI providers and the provider factory.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The vendor API answered with an error or could not be reached.
    #[error("{provider} request failed{}: {message}", status_suffix(.status))]
    Request {
        /// Provider name.
        provider: String,
        /// HTTP status code, when one was received.
        status: Option<u16>,
        /// Error detail.
        message: String,
        /// Whether the next provider in a chain may be tried.
        retryable: bool,
    },

    /// The request did not complete within the configured timeout.
    #[error("{provider} request timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// Provider name.
        provider: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The provider configuration failed validation.
    #[error("invalid {provider} configuration: {reason}")]
    InvalidConfig {
        /// Provider name.
        provider: String,
        /// Why validation failed.
        reason: String,
    },

    /// No constructor is registered for the provider name.
    #[error("unsupported provider: {name}")]
    UnknownProvider {
        /// Name that was requested.
        name: String,
    },

    /// The vendor answered successfully but without any text.
    #[error("{provider} returned an empty response")]
    EmptyResponse {
        /// Provider name.
        provider: String,
    },

    /// Every provider in the fallback chain failed.
    #[error("all providers failed: {}", summarize(.attempts))]
    AllProvidersFailed {
        /// Attempts in the order they were made.
        attempts: Vec<FailedAttempt>,
    },

    /// The fallback chain was empty.
    #[error("no provider configurations supplied")]
    NoProviders,
}

impl ProviderError {
    /// Builds a [`ProviderError::Request`] classifying retryability from the
    /// HTTP status.
    #[must_use]
    pub fn from_status(provider: &str, status: u16, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.to_string(),
            status: Some(status),
            message: message.into(),
            retryable: is_retryable_status(status),
        }
    }

    /// Builds a retryable transport-level [`ProviderError::Request`].
    #[must_use]
    pub fn transport(provider: &str, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.to_string(),
            status: None,
            message: message.into(),
            retryable: true,
        }
    }

    /// Whether the fallback chain may move on to the next provider.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Request { retryable, .. } => *retryable,
            Self::Timeout { .. } | Self::EmptyResponse { .. } => true,
            Self::InvalidConfig { .. }
            | Self::UnknownProvider { .. }
            | Self::AllProvidersFailed { .. }
            | Self::NoProviders => false,
        }
    }

    /// HTTP status code, if the failure carried one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => *status,
            _ => None,
        }
    }
}

/// Statuses worth handing to the next provider: timeouts, conflicts,
/// rate limits, and server errors.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 429) || status >= 500
}

/// Errors raised while advancing or starting a conversation flow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    /// The session references a flow that is not loaded.
    #[error("flow not found: {flow_id}")]
    UnknownFlow {
        /// Missing flow id.
        flow_id: String,
    },

    /// The session references a step the flow does not define.
    #[error("step {step_id} not found in flow {flow_id}")]
    UnknownStep {
        /// Flow id.
        flow_id: String,
        /// Missing step id.
        step_id: String,
    },

    /// The flow has no steps to start from.
    #[error("flow {flow_id} has no steps")]
    EmptyFlow {
        /// Flow id.
        flow_id: String,
    },
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `SQLite` error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored JSON could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database has no schema yet.
    #[error("database not initialized (run `receptionist init`)")]
    NotInitialized,

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),

    /// Stored data violates an expected invariant.
    #[error("invalid stored data: {0}")]
    Invalid(String),
}

/// Failures inside the message-processing pipeline.
///
/// These never cross [`AgentEngine::process_message`](crate::engine::AgentEngine::process_message);
/// the engine turns them into the fallback reply.
#[derive(Debug, Error)]
pub enum EngineError {
    /// AI generation failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A flow could not be started.
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// A store could not be read.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Invalid argument value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command could not be carried out.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// Settings file could not be loaded.
    #[error("failed to load settings from {path}: {reason}")]
    Settings {
        /// Settings file path.
        path: String,
        /// Failure detail.
        reason: String,
    },

    /// Writing output failed.
    #[error("output error: {0}")]
    Output(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(StorageError::Io(err))
    }
}
