//! Caches backend summaries and drops them when a store reports new settings.

use super::events::StoreEvent;
use super::proxy::EventProxy;
use crate::core::{DigestSummary, RepoKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct SummaryCache {
    entries: HashMap<RepoKey, DigestSummary>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RepoKey) -> Option<&DigestSummary> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: RepoKey, summary: DigestSummary) {
        self.entries.insert(key, summary);
    }

    pub fn invalidate(&mut self, key: &RepoKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Applies a store event; returns `true` if an entry was dropped.
    pub fn handle_event(&mut self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::SettingsChanged { key } => {
                let dropped = self.invalidate(key);
                if dropped {
                    tracing::info!("Invalidated cached summary for {}", key);
                }
                dropped
            }
            _ => false,
        }
    }
}

/// Wraps another proxy and invalidates `cache` before forwarding each event.
///
/// The cache is updated on the sending side, so once a store call returns
/// its invalidation has already been applied.
#[derive(Debug, Clone)]
pub struct InvalidatingProxy<P: EventProxy> {
    cache: Arc<Mutex<SummaryCache>>,
    inner: P,
}

impl<P: EventProxy> InvalidatingProxy<P> {
    pub fn new(cache: Arc<Mutex<SummaryCache>>, inner: P) -> Self {
        Self { cache, inner }
    }
}

impl<P: EventProxy> EventProxy for InvalidatingProxy<P> {
    fn send_event(&self, event: StoreEvent) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_event(&event);
        self.inner.send_event(event);
    }
}
