// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Buffer of asynchronous failures.
//!
//! Every failure that happens after `send` has returned is appended here
//! with its endpoint and originating request id. Records are never removed
//! automatically; operators inspect and clear them.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::status::Outcome;

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Endpoint URI, when known.
    pub endpoint: Option<String>,
    /// Failure result.
    pub outcome: Outcome,
    /// Originating request id, when known.
    pub request_id: Option<String>,
    /// Time of recording.
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    /// Creates a record stamped with the current time.
    pub fn new(endpoint: Option<String>, outcome: Outcome, request_id: Option<String>) -> Self {
        Self {
            endpoint,
            outcome,
            request_id,
            timestamp: Utc::now(),
        }
    }
}

/// Thread-safe, append-only error buffer.
#[derive(Debug, Default)]
pub struct ErrorSink {
    records: Mutex<Vec<ErrorRecord>>,
}

impl ErrorSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn record(&self, record: ErrorRecord) {
        warn!(
            endpoint = record.endpoint.as_deref().unwrap_or("-"),
            request_id = record.request_id.as_deref().unwrap_or("-"),
            status = %record.outcome,
            "Error recorded"
        );
        self.records.lock().push(record);
    }

    /// Appends a record built from its parts.
    pub fn add(&self, endpoint: Option<&str>, outcome: Outcome, request_id: Option<&str>) {
        self.record(ErrorRecord::new(
            endpoint.map(str::to_string),
            outcome,
            request_id.map(str::to_string),
        ));
    }

    /// Returns a snapshot of all records in insertion order.
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().clone()
    }

    /// Returns the records of one endpoint.
    pub fn records_for(&self, endpoint: &str) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.endpoint.as_deref() == Some(endpoint))
            .cloned()
            .collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Removes and returns all records.
    pub fn drain(&self) -> Vec<ErrorRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;
    use std::sync::Arc;

    #[test]
    fn test_record_and_filter() {
        let sink = ErrorSink::new();
        sink.add(Some("A"), StatusCode::InternalError.into(), Some("1"));
        sink.add(Some("B"), StatusCode::InternalError.into(), None);
        sink.add(None, StatusCode::Error.into(), Some("3"));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.records_for("A").len(), 1);
        assert_eq!(sink.records()[2].request_id.as_deref(), Some("3"));

        let drained = sink.drain();
        assert_eq!(drained.len(), 3);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_concurrent_appends() {
        let sink = Arc::new(ErrorSink::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        sink.add(Some("X"), StatusCode::InternalError.into(), Some(&format!("{i}-{j}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 400);
    }
}
