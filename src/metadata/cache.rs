//! Link metadata cache and staggered prefetching

use super::resolver::{hostname_fallback, ResolverChain};
use crate::api::LinkMetadata;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Resolved metadata keyed by URL
///
/// An entry is written once and never replaced. Concurrent resolutions of
/// the same URL all observe the value stored first.
#[derive(Default)]
pub struct MetadataCache {
    entries: DashMap<String, LinkMetadata>,
    in_flight: DashSet<String>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<LinkMetadata> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn is_in_flight(&self, url: &str) -> bool {
        self.in_flight.contains(url)
    }

    /// Store `metadata` unless the URL already has a value; returns what is stored
    pub fn insert(&self, url: &str, metadata: LinkMetadata) -> LinkMetadata {
        match self.entries.entry(url.to_string()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => slot.insert(metadata).value().clone(),
        }
    }

    /// Reserve a URL for resolution; `None` when cached or already claimed
    pub fn try_claim(self: &Arc<Self>, url: &str) -> Option<Claim> {
        if self.contains(url) || !self.in_flight.insert(url.to_string()) {
            return None;
        }
        Some(Claim {
            cache: Arc::clone(self),
            url: url.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached value, or resolve now and store the result
    pub async fn get_or_resolve(&self, url: &str, chain: &ResolverChain) -> LinkMetadata {
        if let Some(cached) = self.get(url) {
            return cached;
        }
        let metadata = chain.resolve(url).await;
        self.insert(url, metadata)
    }

    /// Resolve a message's links in place, link `i` starting after `i * stagger`
    ///
    /// Cached links cost nothing and a URL repeated within the batch is
    /// resolved once. The result is in the order of `links`.
    pub async fn resolve_staggered(
        &self,
        links: &[String],
        chain: &ResolverChain,
        stagger: Duration,
    ) -> Vec<LinkMetadata> {
        let mut pending: Vec<(usize, &str)> = Vec::new();
        for (index, url) in links.iter().enumerate() {
            if !self.contains(url) && !pending.iter().any(|(_, seen)| *seen == url.as_str()) {
                pending.push((index, url.as_str()));
            }
        }

        let fetches = pending.into_iter().map(|(index, url)| async move {
            let delay = stagger * index as u32;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.get_or_resolve(url, chain).await;
        });
        futures::future::join_all(fetches).await;

        links
            .iter()
            .map(|url| self.get(url).unwrap_or_else(|| hostname_fallback(url)))
            .collect()
    }
}

/// In-flight marker for one URL, released on drop
pub struct Claim {
    cache: Arc<MetadataCache>,
    url: String,
}

impl Claim {
    pub fn complete(self, metadata: LinkMetadata) -> LinkMetadata {
        self.cache.insert(&self.url, metadata)
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.cache.in_flight.remove(&self.url);
    }
}

/// Owns the background fetches started for a conversation's links
///
/// Link `i` of a batch starts after `i * stagger`. Pending and running
/// fetches are aborted by [`LinkPrefetcher::shutdown`] or when the
/// prefetcher is dropped.
pub struct LinkPrefetcher {
    cache: Arc<MetadataCache>,
    chain: Arc<ResolverChain>,
    stagger: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LinkPrefetcher {
    pub fn new(cache: Arc<MetadataCache>, chain: Arc<ResolverChain>, stagger: Duration) -> Self {
        Self {
            cache,
            chain,
            stagger,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start one delayed fetch per uncached link, returning how many were scheduled
    pub fn schedule(&self, links: &[String]) -> usize {
        let Ok(mut tasks) = self.tasks.lock() else {
            return 0;
        };
        tasks.retain(|task| !task.is_finished());

        let mut scheduled = 0;
        for (index, link) in links.iter().enumerate() {
            if self.cache.contains(link) || self.cache.is_in_flight(link) {
                continue;
            }
            let delay = self.stagger * index as u32;
            let cache = Arc::clone(&self.cache);
            let chain = Arc::clone(&self.chain);
            let url = link.clone();

            tasks.push(tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                // Another batch may have resolved it while we waited
                let Some(claim) = cache.try_claim(&url) else {
                    return;
                };
                let metadata = chain.resolve(&url).await;
                claim.complete(metadata);
            }));
            scheduled += 1;
        }

        if scheduled > 0 {
            tracing::debug!("Scheduled metadata fetch for {} link(s)", scheduled);
        }
        scheduled
    }

    /// Fetches not yet finished
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|task| !task.is_finished()).count())
            .unwrap_or(0)
    }

    pub fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl Drop for LinkPrefetcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
