//! Error types for the estimator service.
//!
//! The estimation core itself never fails (malformed input degrades to
//! well-defined defaults), so everything here belongs to startup and the
//! HTTP boundary: loading embedded data, building tokenizers, binding the
//! listener.

use thiserror::Error;

/// Failure to construct the template registry from embedded data.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The embedded registry JSON did not deserialize.
    #[error("malformed embedded template data: {0}")]
    Data(#[from] serde_json::Error),
}

/// Failure to initialize a tokenizer backend.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// A tiktoken encoding failed to build.
    #[error("failed to initialize {encoding} tokenizer: {reason}")]
    Init { encoding: &'static str, reason: String },
}

/// Failure to read startup configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Failure in the HTTP server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server could not bind or start serving.
    #[error("server startup failed: {reason}")]
    StartupFailed { reason: String },
}
