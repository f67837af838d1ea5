use chrono::Utc;
use gemini_bridge::{AnalysisResult, Cache, CacheConfig, Metrics, TokenUsage};

fn sample_result(request_id: &str) -> AnalysisResult {
    AnalysisResult {
        success: true,
        request_id: request_id.to_string(),
        timestamp: Utc::now(),
        duration_ms: 10,
        token_usage: TokenUsage::default(),
        summary: "ok".to_string(),
        findings: Vec::new(),
        metrics: Metrics::default(),
        recommendations: Vec::new(),
        raw_output: Some("{}".to_string()),
        errors: None,
    }
}

fn config_in(dir: &std::path::Path) -> CacheConfig {
    CacheConfig {
        enabled: true,
        ttl_ms: 3_600_000,
        max_entries: 100,
        directory: dir.to_string_lossy().into_owned(),
    }
}

/// S7 — TTL eviction: after the TTL elapses, `get` returns `None` and the
/// shard file is gone from disk.
#[tokio::test]
async fn ttl_eviction_removes_memory_and_disk_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.ttl_ms = 50;
    let cache = Cache::new(config);
    cache.initialize().await.unwrap();

    cache.set("k", sample_result("k")).await;
    let shard_path = dir.path().join("k.json");
    assert!(shard_path.exists());

    tokio::time::sleep(std::time::Duration::from_millis(120)).await;

    assert!(cache.get("k").await.is_none());
    assert!(!shard_path.exists());
}

/// S8 — LRU eviction under pressure: with `maxEntries=3`, inserting a 4th
/// key evicts the least-recently-used one (k1, since k2/k3 are untouched
/// after insertion and k1 was inserted first and never re-read).
#[tokio::test]
async fn lru_eviction_under_pressure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.max_entries = 3;
    let cache = Cache::new(config);
    cache.initialize().await.unwrap();

    cache.set("k1", sample_result("k1")).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    cache.set("k2", sample_result("k2")).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    cache.set("k3", sample_result("k3")).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    cache.set("k4", sample_result("k4")).await;

    assert!(cache.get("k1").await.is_none());
    assert!(!dir.path().join("k1.json").exists());
    assert!(cache.get("k2").await.is_some());
    assert!(cache.get("k3").await.is_some());
    assert!(cache.get("k4").await.is_some());
}

/// S9 — disk recovery: a fresh shard written before `initialize()` survives
/// into memory and on disk; a stale one is removed from both.
#[tokio::test]
async fn initialize_recovers_fresh_shards_and_purges_stale_ones() {
    let dir = tempfile::tempdir().unwrap();
    let ttl_ms: i64 = 1_000;
    let config = {
        let mut c = config_in(dir.path());
        c.ttl_ms = ttl_ms as u64;
        c
    };

    let now = Utc::now().timestamp_millis();
    write_raw_shard(dir.path(), "fresh", now - 10);
    write_raw_shard(dir.path(), "stale", now - ttl_ms - 1);

    let cache = Cache::new(config);
    cache.initialize().await.unwrap();

    assert!(cache.get("fresh").await.is_some());
    assert!(dir.path().join("fresh.json").exists());
    assert!(cache.get("stale").await.is_none());
    assert!(!dir.path().join("stale.json").exists());
}

fn write_raw_shard(dir: &std::path::Path, key: &str, created_at: i64) {
    let result = sample_result(key);
    let entry = serde_json::json!({
        "key": key,
        "value": result,
        "created_at": created_at,
        "accessed_at": created_at,
        "size_bytes": 2,
    });
    std::fs::write(
        dir.join(format!("{key}.json")),
        serde_json::to_vec(&entry).unwrap(),
    )
    .unwrap();
}

#[tokio::test]
async fn stats_reports_entry_count_and_hit_rate() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::new(config_in(dir.path()));
    cache.initialize().await.unwrap();

    cache.set("a", sample_result("a")).await;
    let _ = cache.get("a").await;
    let _ = cache.get("missing").await;

    let stats = cache.stats().await;
    assert_eq!(stats.entries, 1);
    assert!(stats.hit_rate > 0.0 && stats.hit_rate < 1.0);
    assert!(stats.oldest_entry_age_ms.is_some());
}
