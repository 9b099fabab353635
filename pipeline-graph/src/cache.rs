// Metadata Cache
// Loading caches for branch and pull request metadata, keyed by job full name

use crate::config::CacheSettings;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Errors that can occur while loading metadata
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to load metadata for {key}: {message}")]
    LoadFailed { key: String, message: String },
}

/// Configuration for a single metadata cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before the least recently used is evicted
    pub max_size: usize,

    /// Entries not read for this long are loaded again
    pub expire_after_access: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            expire_after_access: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Source of metadata for a job. `None` means the job has none, which is
/// cached like any other value.
#[async_trait]
pub trait MetadataLoader<V>: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<V>, CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: Option<V>,
    last_access: Instant,
    /// Position in access order, for eviction
    access_seq: u64,
}

/// Cached entries plus their keys in access order
#[derive(Debug)]
struct Entries<V> {
    by_key: HashMap<String, CacheEntry<V>>,
    by_access: BTreeMap<u64, String>,
}

impl<V> Default for Entries<V> {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            by_access: BTreeMap::new(),
        }
    }
}

impl<V> Entries<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.by_key.remove(key)?;
        self.by_access.remove(&entry.access_seq);
        Some(entry)
    }

    fn touch(&mut self, key: &str, access_seq: u64) {
        if let Some(entry) = self.by_key.get_mut(key) {
            self.by_access.remove(&entry.access_seq);
            entry.access_seq = access_seq;
            entry.last_access = Instant::now();
            self.by_access.insert(access_seq, key.to_string());
        }
    }

    fn insert(&mut self, key: &str, entry: CacheEntry<V>) {
        self.remove(key);
        self.by_access.insert(entry.access_seq, key.to_string());
        self.by_key.insert(key.to_string(), entry);
    }

    /// Drop least recently accessed entries until at most `max_size` remain
    fn evict_to(&mut self, max_size: usize) {
        while self.by_key.len() > max_size {
            let Some((_, oldest)) = self.by_access.pop_first() else {
                break;
            };
            debug!(key = %oldest, "evicting metadata");
            self.by_key.remove(&oldest);
        }
    }
}

/// Size-bounded cache with expire-after-access semantics
pub struct MetadataCache<V> {
    config: CacheConfig,
    loader: Arc<dyn MetadataLoader<V>>,
    entries: Arc<RwLock<Entries<V>>>,
    access_seq: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> MetadataCache<V> {
    /// Create a cache with default configuration
    pub fn new(loader: Arc<dyn MetadataLoader<V>>) -> Self {
        Self::with_config(CacheConfig::default(), loader)
    }

    pub fn with_config(config: CacheConfig, loader: Arc<dyn MetadataLoader<V>>) -> Self {
        Self {
            config,
            loader,
            entries: Arc::new(RwLock::new(Entries::default())),
            access_seq: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cached value for `key`, loading it on a miss or after expiry
    pub async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        {
            let mut entries = self.entries.write().await;
            let expire = self.config.expire_after_access;
            let cached = entries
                .by_key
                .get(key)
                .map(|e| (e.last_access.elapsed() < expire, e.value.clone()));
            match cached {
                Some((true, value)) => {
                    entries.touch(key, self.next_access());
                    return Ok(value);
                }
                Some((false, _)) => {
                    debug!(key, "metadata expired");
                    entries.remove(key);
                }
                None => {}
            }
        }

        let value = self.loader.load(key).await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Cached value without loading; the outer `None` is a miss
    pub async fn get_if_present(&self, key: &str) -> Option<Option<V>> {
        let entries = self.entries.read().await;
        entries
            .by_key
            .get(key)
            .filter(|e| e.last_access.elapsed() < self.config.expire_after_access)
            .map(|e| e.value.clone())
    }

    /// Load `key` again. The previous value stays if loading fails.
    pub async fn refresh(&self, key: &str) -> Result<(), CacheError> {
        let value = self.loader.load(key).await?;
        self.insert(key, value).await;
        Ok(())
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.by_key.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.by_key.is_empty()
    }

    fn next_access(&self) -> u64 {
        self.access_seq.fetch_add(1, Ordering::Relaxed)
    }

    async fn insert(&self, key: &str, value: Option<V>) {
        let access_seq = self.next_access();
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                last_access: Instant::now(),
                access_seq,
            },
        );
        entries.evict_to(self.config.max_size);
    }
}

/// Source control metadata of a branch job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMetadata {
    pub url: Option<String>,
    /// Whether this is the primary branch of its repository
    pub primary: bool,
}

/// Source control metadata of a pull request job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestMetadata {
    pub id: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Change to a job that affects its cached metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Renamed {
        old_full_name: String,
        new_full_name: String,
    },
    Updated {
        full_name: String,
    },
    Deleted {
        full_name: String,
    },
}

/// The branch and pull request metadata caches
pub struct Caches {
    pub branch_metadata: MetadataCache<BranchMetadata>,
    pub pull_request_metadata: MetadataCache<PullRequestMetadata>,
}

impl Caches {
    pub fn new(
        settings: &CacheSettings,
        branch_loader: Arc<dyn MetadataLoader<BranchMetadata>>,
        pull_request_loader: Arc<dyn MetadataLoader<PullRequestMetadata>>,
    ) -> Self {
        Self {
            branch_metadata: MetadataCache::with_config(
                settings.branch_cache_config(),
                branch_loader,
            ),
            pull_request_metadata: MetadataCache::with_config(
                settings.pull_request_cache_config(),
                pull_request_loader,
            ),
        }
    }

    /// Keep both caches in step with a job change. Refresh failures are
    /// logged; the stale value stays until it expires.
    pub async fn on_job_event(&self, event: &JobEvent) {
        match event {
            JobEvent::Renamed {
                old_full_name,
                new_full_name,
            } => {
                self.pull_request_metadata.invalidate(old_full_name).await;
                self.branch_metadata.invalidate(old_full_name).await;
                self.refresh(new_full_name).await;
            }
            JobEvent::Updated { full_name } => self.refresh(full_name).await,
            JobEvent::Deleted { full_name } => {
                self.pull_request_metadata.invalidate(full_name).await;
                self.branch_metadata.invalidate(full_name).await;
            }
        }
    }

    async fn refresh(&self, full_name: &str) {
        if let Err(e) = self.pull_request_metadata.refresh(full_name).await {
            warn!(job = full_name, error = %e, "pull request metadata refresh failed");
        }
        if let Err(e) = self.branch_metadata.refresh(full_name).await {
            warn!(job = full_name, error = %e, "branch metadata refresh failed");
        }
    }
}
