// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Status codes and command outcomes.
//!
//! [`StatusCode`] is the closed enumeration shared by synchronous results,
//! asynchronous error records and connectivity/lifecycle notifications.
//! [`Outcome`] pairs a status code with optional diagnostic text and is the
//! value returned to callers of the synchronous gateway API.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// StatusCode
// =============================================================================

/// Result and status codes used throughout the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Operation accepted or completed.
    Ok,
    /// Message or argument failed validation.
    ParamInvalid,
    /// The dispatch queue refused the message.
    EnqueueError,
    /// A command handler or session transition failed.
    InternalError,
    /// Generic failure reported by a collaborator.
    Error,
    /// A server-side operation was attempted with no running server.
    NotStartServer,
    /// A client session became active.
    Connected,
    /// A client session became inactive.
    Disconnected,
    /// A client finished its start sequence.
    ClientStarted,
    /// The embedded server finished its start sequence.
    ServerStarted,
    /// A client was stopped.
    StopClient,
    /// The embedded server was stopped.
    StopServer,
}

/// Routing category of a status code delivered to the status receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    /// `CLIENT_STARTED` / `SERVER_STARTED`.
    Start,
    /// `STOP_CLIENT` / `STOP_SERVER`.
    Stop,
    /// `CONNECTED` / `DISCONNECTED`.
    Network,
    /// Everything else; not routable as a status.
    Other,
}

impl StatusCode {
    /// Returns `true` for [`StatusCode::Ok`].
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns `true` for codes that describe a failure.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ParamInvalid
                | Self::EnqueueError
                | Self::InternalError
                | Self::Error
                | Self::NotStartServer
        )
    }

    /// Returns how a status receiver should route this code.
    pub fn category(&self) -> StatusCategory {
        match self {
            Self::ClientStarted | Self::ServerStarted => StatusCategory::Start,
            Self::StopClient | Self::StopServer => StatusCategory::Stop,
            Self::Connected | Self::Disconnected => StatusCategory::Network,
            _ => StatusCategory::Other,
        }
    }

    /// Returns the wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ParamInvalid => "PARAM_INVALID",
            Self::EnqueueError => "ENQUEUE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Error => "ERROR",
            Self::NotStartServer => "NOT_START_SERVER",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::ClientStarted => "CLIENT_STARTED",
            Self::ServerStarted => "SERVER_STARTED",
            Self::StopClient => "STOP_CLIENT",
            Self::StopServer => "STOP_SERVER",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// A terminal, immutable result: status code plus optional diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// The status code.
    pub status: StatusCode,
    /// Optional human-readable diagnostic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl Outcome {
    /// Creates an outcome with no diagnostic.
    pub const fn new(status: StatusCode) -> Self {
        Self {
            status,
            diagnostic: None,
        }
    }

    /// Creates an `OK` outcome.
    pub const fn ok() -> Self {
        Self::new(StatusCode::Ok)
    }

    /// Creates an outcome carrying a diagnostic.
    pub fn with_diagnostic(status: StatusCode, diagnostic: impl Into<String>) -> Self {
        Self {
            status,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// Returns `true` if the status is `OK`.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

impl From<StatusCode> for Outcome {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.diagnostic {
            Some(text) => write!(f, "{} ({})", self.status, text),
            None => write!(f, "{}", self.status),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_category() {
        assert_eq!(StatusCode::ClientStarted.category(), StatusCategory::Start);
        assert_eq!(StatusCode::ServerStarted.category(), StatusCategory::Start);
        assert_eq!(StatusCode::StopClient.category(), StatusCategory::Stop);
        assert_eq!(StatusCode::StopServer.category(), StatusCategory::Stop);
        assert_eq!(StatusCode::Connected.category(), StatusCategory::Network);
        assert_eq!(StatusCode::Disconnected.category(), StatusCategory::Network);
        assert_eq!(StatusCode::InternalError.category(), StatusCategory::Other);
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&StatusCode::NotStartServer).unwrap();
        assert_eq!(json, "\"NOT_START_SERVER\"");

        let parsed: StatusCode = serde_json::from_str("\"ENQUEUE_ERROR\"").unwrap();
        assert_eq!(parsed, StatusCode::EnqueueError);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::ok().to_string(), "OK");
        let outcome = Outcome::with_diagnostic(StatusCode::ParamInvalid, "missing valueAlias");
        assert_eq!(outcome.to_string(), "PARAM_INVALID (missing valueAlias)");
        assert!(!outcome.is_ok());
        assert!(outcome.status.is_failure());
    }
}
