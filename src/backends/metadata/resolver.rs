// Process metadata resolution over the fallback chain

use super::cache::MetadataCache;
use super::{MetadataQuery, MetadataSource, PartialMetadata, default_sources};
use crate::backends::command::CommandProbe;
use crate::process::ProcessMetadata;
use std::sync::Arc;
use std::time::Duration;

/// Resolves identity metadata for a process, caching results per (name, pid)
///
/// Resolution is strictly sequential: each source runs to completion before
/// the next is tried, and the chain stops as soon as every field is known.
/// `resolve` blocks on external commands; async callers should run it on a
/// blocking pool.
pub struct ProcessMetadataResolver {
    sources: Vec<Box<dyn MetadataSource>>,
    cache: Arc<MetadataCache>,
}

impl ProcessMetadataResolver {
    pub fn new(sources: Vec<Box<dyn MetadataSource>>, cache: Arc<MetadataCache>) -> Self {
        Self { sources, cache }
    }

    /// Resolver using the standard source chain
    pub fn with_default_sources(probe: Arc<dyn CommandProbe>, ttl: Duration) -> Self {
        Self::new(default_sources(probe), Arc::new(MetadataCache::new(ttl)))
    }

    pub fn sources(&self) -> &[Box<dyn MetadataSource>] {
        &self.sources
    }

    /// Shared handle to the cache, e.g. for a `CacheJanitor`
    pub fn cache(&self) -> Arc<MetadataCache> {
        Arc::clone(&self.cache)
    }

    /// Resolve metadata for `pid`, known to the caller as `name`
    ///
    /// Never fails. A fresh cached record is returned without touching any
    /// source; otherwise the chain runs and its (possibly partial) result
    /// replaces the cached one. The worst case is a record carrying only
    /// `name` and the generic icon.
    pub fn resolve(&self, pid: i32, name: &str) -> ProcessMetadata {
        if let Some(cached) = self.cache.get(name, pid) {
            log::trace!("metadata cache hit for {} ({})", name, pid);
            return cached;
        }

        let query = MetadataQuery { pid, name };
        let record = self.run_chain(&query).into_metadata(&query);
        self.cache.put_if_absent_or_stale(name, pid, record)
    }

    /// Invalidate every cached record
    pub fn clear_cache(&self) {
        self.cache.clear_all();
    }

    fn run_chain(&self, query: &MetadataQuery) -> PartialMetadata {
        let mut found = PartialMetadata::default();

        for source in &self.sources {
            if found.is_complete() {
                break;
            }

            match source.resolve(query, &found) {
                Ok(contribution) => {
                    let filled = found.merge(contribution, query.name);
                    if !filled.is_empty() {
                        log::debug!(
                            "{}: filled {:?} for {} ({})",
                            source.name(),
                            filled,
                            query.name,
                            query.pid
                        );
                    }
                }
                Err(e) => {
                    log::debug!("{}: no contribution: {}", source.name(), e);
                }
            }
        }

        found
    }
}
