// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the protocol-agnostic core.
//!
//! # Error Hierarchy
//!
//! ```text
//! CoreError (root)
//! ├── Validation     - message rejected before dispatch (PARAM_INVALID)
//! ├── QueueClosed    - dispatch queue terminated (ENQUEUE_ERROR)
//! ├── QueueFull      - bounded dispatch queue at capacity (ENQUEUE_ERROR)
//! ├── Handler        - a dispatch handler failed or panicked
//! └── Runtime        - no async runtime available to host a worker
//! ```

use thiserror::Error;

use crate::message::{CommandType, MessageKind};
use crate::status::StatusCode;

// =============================================================================
// CoreError
// =============================================================================

/// The root error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// The message failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The dispatch queue has been terminated.
    #[error("Dispatch queue '{queue}' is closed")]
    QueueClosed {
        /// Queue name.
        queue: String,
    },

    /// The dispatch queue is at capacity.
    #[error("Dispatch queue '{queue}' is full (capacity {capacity})")]
    QueueFull {
        /// Queue name.
        queue: String,
        /// Configured capacity.
        capacity: usize,
    },

    /// A dispatch handler failed.
    #[error("Handler failed: {0}")]
    Handler(String),

    /// No runtime is available to spawn a worker.
    #[error("Runtime unavailable: {0}")]
    Runtime(String),
}

impl CoreError {
    /// Creates a queue-closed error.
    pub fn queue_closed(queue: impl Into<String>) -> Self {
        Self::QueueClosed {
            queue: queue.into(),
        }
    }

    /// Creates a queue-full error.
    pub fn queue_full(queue: impl Into<String>, capacity: usize) -> Self {
        Self::QueueFull {
            queue: queue.into(),
            capacity,
        }
    }

    /// Creates a handler error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// Creates a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }

    /// Returns the status code reported to callers.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::ParamInvalid,
            Self::QueueClosed { .. } | Self::QueueFull { .. } => StatusCode::EnqueueError,
            Self::Handler(_) | Self::Runtime(_) => StatusCode::InternalError,
        }
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::QueueClosed { .. } => "queue_closed",
            Self::QueueFull { .. } => "queue_full",
            Self::Handler(_) => "handler",
            Self::Runtime(_) => "runtime",
        }
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// The validation rule a message violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The command type is absent.
    #[error("command type is missing")]
    MissingCommand,

    /// The message kind is absent.
    #[error("message kind is missing")]
    MissingKind,

    /// A request carries no node info.
    #[error("request '{request_id}' has no endpoint descriptor")]
    MissingNodeInfo {
        /// Offending request id.
        request_id: String,
    },

    /// The message kind does not match the populated request fields.
    #[error("message kind {kind} does not match the populated requests")]
    KindMismatch {
        /// Declared kind.
        kind: MessageKind,
    },

    /// A batch message carries an empty request list.
    #[error("{command} batch carries no requests")]
    EmptyBatch {
        /// Command type.
        command: CommandType,
    },

    /// The command requires a value alias on its request.
    #[error("{command} command should use valueAlias")]
    MissingValueAlias {
        /// Command type.
        command: CommandType,
    },

    /// The command requires exactly one request.
    #[error("{command} command should use a single request")]
    SingleRequestRequired {
        /// Command type.
        command: CommandType,
    },

    /// Method invocation needs a payload.
    #[error("{command} command needs a parameter value")]
    MissingPayload {
        /// Command type.
        command: CommandType,
    },

    /// Subscription descriptor or its sub-type is absent.
    #[error("{command} command should set both subRequest and subType")]
    MissingSubscription {
        /// Command type.
        command: CommandType,
    },

    /// Browse needs a browse parameter block.
    #[error("{command} command should set browse-parameter")]
    MissingBrowseParameter {
        /// Command type.
        command: CommandType,
    },

    /// Endpoint-wide commands need endpoint info on the message.
    #[error("{command} command needs endpoint info")]
    MissingEndpoint {
        /// Command type.
        command: CommandType,
    },
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: CoreError = ValidationError::MissingCommand.into();
        assert_eq!(err.status_code(), StatusCode::ParamInvalid);
        assert_eq!(CoreError::queue_closed("send").status_code(), StatusCode::EnqueueError);
        assert_eq!(CoreError::queue_full("send", 4).status_code(), StatusCode::EnqueueError);
    }

    #[test]
    fn test_retryable() {
        assert!(CoreError::queue_full("recv", 1).is_retryable());
        assert!(!CoreError::queue_closed("recv").is_retryable());
    }

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::MissingValueAlias {
            command: CommandType::Write,
        };
        assert_eq!(err.to_string(), "WRITE command should use valueAlias");
    }
}
