// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shutdown trigger shared by the runtime and signal handlers.
//!
//! A single `watch` flag flips from `false` to `true` once. Anything holding
//! a clone can flip it or wait on it; an OS signal flips it too while
//! [`ShutdownCoordinator::wait`] is pending.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::error::{BinError, BinResult};

/// One-shot shutdown flag.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    flag: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    /// Creates an untriggered coordinator.
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag: Arc::new(flag) }
    }

    /// Flips the flag. Returns `false` if it was already set.
    pub fn trigger(&self, reason: &str) -> bool {
        let first = self.flag.send_if_modified(|set| !std::mem::replace(set, true));
        if first {
            info!(reason, "Shutdown triggered");
        }
        first
    }

    /// Returns true once [`trigger`](Self::trigger) has run.
    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves when the flag is set or SIGTERM/SIGINT (Ctrl+C off unix) arrives.
    pub async fn wait(&self) -> BinResult<()> {
        let mut rx = self.flag.subscribe();
        tokio::select! {
            _ = rx.wait_for(|set| *set) => Ok(()),
            signal = os_signal() => {
                self.trigger(signal?);
                Ok(())
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() -> BinResult<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let listen = |kind: SignalKind, name: &'static str| {
        signal(kind).map_err(|e| BinError::signal(name, e))
    };
    let mut term = listen(SignalKind::terminate(), "SIGTERM")?;
    let mut int = listen(SignalKind::interrupt(), "SIGINT")?;

    Ok(tokio::select! {
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn os_signal() -> BinResult<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| BinError::signal("Ctrl+C", e))?;
    Ok("Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_once() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_triggered());

        assert!(coordinator.trigger("test"));
        assert!(!coordinator.clone().trigger("again"));
        assert!(coordinator.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_resolves_on_trigger() {
        let coordinator = ShutdownCoordinator::new();
        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger("test");
        });

        let waited = tokio::time::timeout(Duration::from_secs(1), coordinator.wait()).await;
        assert!(matches!(waited, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger("test");
        assert!(coordinator.wait().await.is_ok());
    }
}
