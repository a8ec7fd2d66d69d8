// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Capability provider registry.
//!
//! Providers map a value alias to the node that backs it. Attribute
//! providers back read/write/subscribe, method providers back method
//! invocation and view providers back browsing. Entries are scoped to the
//! endpoint whose session registered them and are removed when that session
//! goes inactive or terminates.
//!
//! The registry is shared by all sessions; every mutation takes one lock so
//! concurrent session transitions cannot interleave.

use std::collections::BTreeMap;
use std::fmt;

use edge_core::CapabilityKeys;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::types::NodeId;

/// Category of a capability provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    /// Attribute access (read, write, subscribe).
    Attribute,
    /// Method invocation.
    Method,
    /// Browsing.
    View,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Attribute => "attribute",
            Self::Method => "method",
            Self::View => "view",
        };
        f.write_str(s)
    }
}

/// A registered provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEntry {
    /// Endpoint whose session registered the provider.
    pub endpoint: String,
    /// Value alias.
    pub alias: String,
    /// Provider category.
    pub kind: ProviderKind,
    /// Backing node.
    pub node_id: NodeId,
    /// Owning object of a method node.
    pub parent: Option<NodeId>,
}

impl ProviderEntry {
    /// Creates an entry without a parent.
    pub fn new(
        endpoint: impl Into<String>,
        alias: impl Into<String>,
        kind: ProviderKind,
        node_id: NodeId,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            alias: alias.into(),
            kind,
            node_id,
            parent: None,
        }
    }

    /// Sets the owning object.
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }
}

type Key = (ProviderKind, String, String);

/// Registry of capability providers.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    entries: Mutex<BTreeMap<Key, ProviderEntry>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider; returns `true` if it replaced an existing one.
    pub fn register(&self, entry: ProviderEntry) -> bool {
        trace!(endpoint = %entry.endpoint, alias = %entry.alias, kind = %entry.kind, "Provider registered");
        let key = (entry.kind, entry.endpoint.clone(), entry.alias.clone());
        self.entries.lock().insert(key, entry).is_some()
    }

    /// Registers several providers under one lock.
    pub fn register_all(&self, entries: impl IntoIterator<Item = ProviderEntry>) -> usize {
        let mut map = self.entries.lock();
        let mut count = 0;
        for entry in entries {
            let key = (entry.kind, entry.endpoint.clone(), entry.alias.clone());
            map.insert(key, entry);
            count += 1;
        }
        count
    }

    /// Removes every provider of an endpoint; returns how many were removed.
    pub fn deregister_endpoint(&self, endpoint: &str) -> usize {
        let mut map = self.entries.lock();
        let before = map.len();
        map.retain(|(_, ep, _), _| ep != endpoint);
        let removed = before - map.len();
        if removed > 0 {
            debug!(endpoint, removed, "Providers deregistered");
        }
        removed
    }

    /// Looks up an alias for an endpoint, trying the kinds in order.
    pub fn resolve(&self, endpoint: &str, alias: &str, kinds: &[ProviderKind]) -> Option<ProviderEntry> {
        let map = self.entries.lock();
        kinds.iter().find_map(|kind| {
            map.get(&(*kind, endpoint.to_string(), alias.to_string()))
                .cloned()
        })
    }

    /// Returns the sorted, de-duplicated aliases of every registered
    /// provider, by category.
    pub fn keys(&self) -> CapabilityKeys {
        let map = self.entries.lock();
        let collect = |kind: ProviderKind| {
            let mut keys: Vec<String> = map
                .iter()
                .filter(|((k, _, _), _)| *k == kind)
                .map(|((_, _, alias), _)| alias.clone())
                .collect();
            keys.sort();
            keys.dedup();
            keys
        };
        CapabilityKeys {
            attributes: collect(ProviderKind::Attribute),
            methods: collect(ProviderKind::Method),
            views: collect(ProviderKind::View),
        }
    }

    /// Returns the number of providers of an endpoint.
    pub fn count_for(&self, endpoint: &str) -> usize {
        self.entries
            .lock()
            .keys()
            .filter(|(_, ep, _)| ep == endpoint)
            .count()
    }

    /// Returns the total number of providers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
