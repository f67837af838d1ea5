use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::request::AnalysisRequest;
use crate::result::AnalysisResult;

/// Internal cache record. `created_at` drives TTL; `accessed_at` drives LRU
/// eviction. Entries are owned exclusively by the [`super::Cache`]; on-disk
/// shards are authoritative across restarts (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CacheEntry {
    pub key: String,
    pub value: AnalysisResult,
    pub created_at: i64,
    pub accessed_at: i64,
    pub size_bytes: usize,
}

/// Canonicalizes `request` by JSON-serializing it with keys in sorted
/// order, hashes with SHA-256, and takes the first 16 hex characters.
/// Two requests with identical parameters produce the same key regardless
/// of field order in the source object (spec §4.3).
pub fn generate_key(request: &AnalysisRequest) -> String {
    let value = serde_json::to_value(request).expect("AnalysisRequest is always serializable");
    let canonical = canonicalize(&value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn canonicalize(value: &serde_json::Value) -> String {
    // serde_json::Value does not guarantee sorted-key serialization unless
    // the `preserve_order` feature is disabled (the default) and the map is
    // rebuilt through a BTreeMap, which sorts lexicographically.
    fn sort(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let sorted: std::collections::BTreeMap<_, _> =
                    map.iter().map(|(k, v)| (k.clone(), sort(v))).collect();
                serde_json::to_value(sorted).expect("BTreeMap<String, Value> is serializable")
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(sort).collect())
            }
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    for byte in bytes {
        if out.len() >= chars {
            break;
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out.truncate(chars);
    out
}
