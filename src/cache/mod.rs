//! C3 — two-tier (memory + disk-persisted) TTL+LRU cache keyed by a
//! canonical hash of the request. See spec §4.3.

mod entry;

pub use entry::generate_key;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::result::AnalysisResult;
use entry::CacheEntry;

/// Optional filter for [`Cache::invalidate`]: an entry is evicted if
/// `target` is a substring of its `requestId`, or `type` matches any of its
/// findings' `type`. Absent filter evicts everything.
#[derive(Debug, Clone, Default)]
pub struct InvalidatePattern {
    pub target: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: usize,
    /// Placeholder per spec §9 ("the source's cache `hitRate` field is
    /// always zero") unless hit/miss counters are meaningfully populated —
    /// here they are, guarded by the same mutex as the map.
    pub hit_rate: f64,
    pub oldest_entry_age_ms: Option<i64>,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

pub struct Cache {
    config: CacheConfig,
    directory: PathBuf,
    state: Mutex<CacheState>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let directory = PathBuf::from(&config.directory);
        Self {
            config,
            directory,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn shard_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.json"))
    }

    /// Creates the cache directory and reinstates fresh shards into memory,
    /// deleting stale ones. Must succeed on a fresh install (spec §9): a
    /// missing directory is not an error, it is simply created. Disk I/O
    /// runs on the blocking pool (spec §5); the map lock is only taken for
    /// the final pointer swap.
    pub async fn initialize(&self) -> Result<(), crate::error::CacheError> {
        if !self.config.enabled {
            return Ok(());
        }

        let directory = self.directory.clone();
        let create_result = tokio::task::spawn_blocking({
            let directory = directory.clone();
            move || std::fs::create_dir_all(&directory)
        })
        .await;

        match create_result {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(crate::error::CacheError::CreateDir { path: directory, source })
            }
            Err(join_err) => {
                return Err(crate::error::CacheError::CreateDir {
                    path: directory,
                    source: std::io::Error::other(join_err.to_string()),
                })
            }
        }

        let now = Utc::now().timestamp_millis();
        let ttl = self.config.ttl_ms as i64;
        let directory = self.directory.clone();
        let fresh_entries = tokio::task::spawn_blocking(move || scan_shards(&directory, now, ttl))
            .await
            .unwrap_or_default();

        let mut state = self.state.lock().await;
        for entry in fresh_entries {
            state.entries.insert(entry.key.clone(), entry);
        }

        Ok(())
    }

    /// Returns the cached value if present and unexpired, touching
    /// `accessed_at`. Disk is not re-read on hits after `initialize`.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Option<AnalysisResult> {
        if !self.config.enabled {
            return None;
        }
        let now = Utc::now().timestamp_millis();
        let ttl = self.config.ttl_ms as i64;
        let mut state = self.state.lock().await;

        let expired = state
            .entries
            .get(key)
            .map(|e| now - e.created_at > ttl)
            .unwrap_or(false);

        if expired {
            state.entries.remove(key);
            state.misses += 1;
            drop(state);
            let path = self.shard_path(key);
            let _ = tokio::task::spawn_blocking(move || std::fs::remove_file(path)).await;
            return None;
        }

        if let Some(entry) = state.entries.get_mut(key) {
            entry.accessed_at = now;
            let value = entry.value.clone();
            state.hits += 1;
            return Some(value);
        }
        state.misses += 1;
        None
    }

    /// Inserts `value`, evicting LRU entries until the map fits
    /// `max_entries - 1` first, then writes the shard to disk. Disk write
    /// failures are logged and swallowed, per spec §4.3. Eviction and the
    /// shard write both run on the blocking pool, off the map lock.
    #[tracing::instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: AnalysisResult) {
        if !self.config.enabled {
            return;
        }
        let serialized = serde_json::to_string(&value).unwrap_or_default();
        let size_bytes = serialized.len();
        let now = Utc::now().timestamp_millis();

        let mut state = self.state.lock().await;
        let evicted_keys =
            evict_lru_until_under(&mut state, self.config.max_entries.saturating_sub(1));

        let entry = CacheEntry {
            key: key.to_string(),
            value,
            created_at: now,
            accessed_at: now,
            size_bytes,
        };
        state.entries.insert(key.to_string(), entry.clone());
        drop(state);

        let directory = self.directory.clone();
        let shard_path = self.shard_path(key);
        let write_result = tokio::task::spawn_blocking(move || {
            for evicted_key in evicted_keys {
                let _ = std::fs::remove_file(directory.join(format!("{evicted_key}.json")));
            }
            write_shard(&shard_path, &entry)
        })
        .await;

        match write_result {
            Ok(Err(source)) => warn!(key, ?source, "failed to persist cache shard"),
            Err(join_err) => warn!(key, %join_err, "cache shard write task panicked"),
            Ok(Ok(())) => {}
        }
    }

    /// Evicts entries matching `pattern` (or all entries, when absent),
    /// returning the number removed.
    pub async fn invalidate(&self, pattern: Option<&InvalidatePattern>) -> usize {
        let mut state = self.state.lock().await;
        let keys_to_remove: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| matches(pattern, entry))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &keys_to_remove {
            state.entries.remove(key);
        }
        drop(state);

        let directory = self.directory.clone();
        let keys = keys_to_remove.clone();
        let _ = tokio::task::spawn_blocking(move || {
            for key in &keys {
                let _ = std::fs::remove_file(directory.join(format!("{key}.json")));
            }
        })
        .await;

        keys_to_remove.len()
    }

    /// Empties the in-memory map and deletes every shard on disk.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        drop(state);

        let directory = self.directory.clone();
        let _ = tokio::task::spawn_blocking(move || {
            if let Ok(read_dir) = std::fs::read_dir(&directory) {
                for dir_entry in read_dir.flatten() {
                    let path = dir_entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("json") {
                        let _ = std::fs::remove_file(path);
                    }
                }
            }
        })
        .await;
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let total = state.hits + state.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            state.hits as f64 / total as f64
        };
        let size_bytes = state.entries.values().map(|e| e.size_bytes).sum();
        let oldest_entry_age_ms = state
            .entries
            .values()
            .map(|e| e.created_at)
            .min()
            .map(|oldest| Utc::now().timestamp_millis() - oldest);

        CacheStats {
            entries: state.entries.len(),
            size_bytes,
            hit_rate,
            oldest_entry_age_ms,
        }
    }
}

fn matches(pattern: Option<&InvalidatePattern>, entry: &CacheEntry) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    if let Some(target) = pattern.target.as_ref() {
        if entry.value.request_id.contains(target.as_str()) {
            return true;
        }
    }
    if let Some(kind) = pattern.kind.as_ref() {
        if entry.value.findings.iter().any(|f| &f.kind == kind) {
            return true;
        }
    }
    pattern.target.is_none() && pattern.kind.is_none()
}

/// While at or above `target_len`, removes the entry with the smallest
/// `accessed_at` (ties broken arbitrarily by iteration order) from the map,
/// returning the removed keys. Does not touch disk — callers remove the
/// corresponding shards themselves, off the map lock.
fn evict_lru_until_under(state: &mut CacheState, target_len: usize) -> Vec<String> {
    let mut removed = Vec::new();
    while state.entries.len() > target_len {
        let Some(lru_key) = state
            .entries
            .iter()
            .min_by_key(|(_, e)| e.accessed_at)
            .map(|(k, _)| k.clone())
        else {
            break;
        };
        state.entries.remove(&lru_key);
        removed.push(lru_key);
    }
    removed
}

/// Runs on the blocking pool during `initialize`: reads every `*.json`
/// shard, keeps the ones still inside the TTL window, and deletes the rest.
fn scan_shards(directory: &Path, now: i64, ttl: i64) -> Vec<CacheEntry> {
    let mut fresh = Vec::new();

    let read_dir = match std::fs::read_dir(directory) {
        Ok(rd) => rd,
        Err(source) => {
            warn!(?source, "cache directory unreadable during initialize");
            return fresh;
        }
    };

    for dir_entry in read_dir.flatten() {
        let path = dir_entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_shard(&path) {
            Ok(entry) => {
                if now - entry.created_at <= ttl {
                    fresh.push(entry);
                } else {
                    let _ = std::fs::remove_file(&path);
                }
            }
            Err(source) => {
                debug!(?path, ?source, "skipping unparseable cache shard");
            }
        }
    }

    fresh
}

fn load_shard(path: &Path) -> Result<CacheEntry, crate::error::CacheError> {
    let bytes = std::fs::read(path).map_err(|source| crate::error::CacheError::ReadShard {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| crate::error::CacheError::ParseShard {
        path: path.to_path_buf(),
        source,
    })
}

/// Write-then-rename: not a fully atomic guarantee on every filesystem, but
/// sufficient for this domain since cache loss is recoverable (spec §4.3).
fn write_shard(path: &Path, entry: &CacheEntry) -> Result<(), crate::error::CacheError> {
    let serialized =
        serde_json::to_vec(entry).map_err(crate::error::CacheError::Serialize)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &serialized).map_err(|source| crate::error::CacheError::WriteShard {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| crate::error::CacheError::WriteShard {
        path: path.to_path_buf(),
        source,
    })
}
