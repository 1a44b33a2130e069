// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded collection of discovered network adapters.

use crate::net::NetAdapter;
use alloc::sync::Arc;
use alloc::vec::Vec;
use log::warn;

/// Most network interfaces the bridge will adopt in one boot.
pub const MAX_ADAPTERS: usize = 16;

/// The discovery-ordered set of network adapters.
///
/// Filled once during single-threaded initialization and read-only
/// afterwards, so readers (the poll task above all) take no lock.
#[derive(Default)]
pub struct Registry {
    adapters: Vec<Arc<NetAdapter>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: Vec::with_capacity(MAX_ADAPTERS),
        }
    }

    /// Admits an adapter, returning whether it was accepted.
    ///
    /// At capacity the adapter is dropped with a warning; discovery keeps
    /// whatever it admitted so far.
    pub fn register(&mut self, adapter: Arc<NetAdapter>) -> bool {
        if self.adapters.len() == MAX_ADAPTERS {
            warn!(
                "adapter registry full ({MAX_ADAPTERS}), dropping nic{}",
                adapter.id()
            );
            return false;
        }
        self.adapters.push(adapter);
        true
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether discovery admitted no adapter at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// The adapter at `index`, in discovery order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<NetAdapter>> {
        self.adapters.get(index)
    }

    /// Iterates over the adapters in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<NetAdapter>> {
        self.adapters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEnv, MockNic, MockSink};
    use alloc::boxed::Box;

    fn anonymous_adapter(id: usize) -> Arc<NetAdapter> {
        Arc::new(NetAdapter::new(
            id,
            Box::new(MockNic::default()),
            Arc::new(MockEnv::default()),
            Arc::new(MockSink::default()),
        ))
    }

    #[test]
    fn registration_keeps_discovery_order() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        for id in 0..3 {
            assert!(registry.register(anonymous_adapter(id)));
        }
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(1).unwrap().id(), 1);
        let ids: alloc::vec::Vec<usize> = registry.iter().map(|a| a.id()).collect();
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn the_seventeenth_adapter_is_refused() {
        let mut registry = Registry::new();
        for id in 0..MAX_ADAPTERS {
            assert!(registry.register(anonymous_adapter(id)));
        }
        assert!(!registry.register(anonymous_adapter(MAX_ADAPTERS)));
        assert_eq!(registry.len(), MAX_ADAPTERS);
    }
}
