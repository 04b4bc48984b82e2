//! Executor error type
//!
//! Serialized with serde's externally-tagged representation so the wire form
//! is exactly `{"MissingVariable": {"name": "x", "context": "y"}}` and
//! `{"InvalidOperationArguments": {"msg": "..."}}`. The tag strings are
//! stable; additional variants are reserved for future executors.

use serde::{Deserialize, Serialize};

/// Errors produced by flow executors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ExecutorError {
    /// A flow read a variable that is not bound in its environment.
    #[error("missing variable {name} in {context}")]
    MissingVariable { name: String, context: String },

    /// An operation was invoked with arguments the executor rejects.
    #[error("invalid operation arguments: {msg}")]
    InvalidOperationArguments { msg: String },

    /// The executor's durable storage failed underneath it.
    #[error("storage failure: {msg}")]
    StorageFailure { msg: String },
}

impl ExecutorError {
    pub fn missing_variable(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingVariable {
            name: name.into(),
            context: context.into(),
        }
    }

    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidOperationArguments { msg: msg.into() }
    }

    pub fn storage_failure(msg: impl std::fmt::Display) -> Self {
        Self::StorageFailure {
            msg: msg.to_string(),
        }
    }
}
