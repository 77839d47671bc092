// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-cache usage example.
//!
//! Demonstrates:
//! 1. Setting up a cache over a filesystem blob store
//! 2. Remote, disk and memory hits
//! 3. Watching the disk-access stream
//! 4. Bounding an operation with a TimeoutGuard
//! 5. Displaying metrics
//! 6. Restart, clear and shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use tokio_stream::StreamExt;

use tiered_cache::{
    CachedBlob, CachingLoader, FsBlobStore, GuardError, LoaderError, Origin, TieredCache,
    TieredCacheConfig, TimeoutGuard,
};

/// Pretend CDN: 50ms per download.
#[derive(Clone)]
struct SlowCdn;

#[async_trait]
impl Origin<CachedBlob> for SlowCdn {
    async fn download(&self, key: &str) -> Result<CachedBlob, LoaderError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(CachedBlob::new(key, format!("<bytes of {}>", key).into_bytes()))
    }
}

async fn boot(config: &TieredCacheConfig) -> Result<TieredCache<CachedBlob>, Box<dyn std::error::Error>> {
    let store = Arc::new(FsBlobStore::from_config(config).await?);
    let loader = Arc::new(CachingLoader::new(SlowCdn));
    let mut cache: TieredCache<CachedBlob> = TieredCache::new(config.clone(), store, loader);
    cache.set_up().await?;
    Ok(cache)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures all metrics for display)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and set up the cache
    // ─────────────────────────────────────────────────────────────────────────
    let dir = tempfile::tempdir()?;
    let config = TieredCacheConfig {
        storage_dir: Some(dir.path().to_string_lossy().into_owned()),
        remote_timeout_ms: Some(1_000),
        ..Default::default()
    };

    println!("📦 Setting up cache in {}", dir.path().display());
    let cache = Arc::new(boot(&config).await?);
    println!("   State: {}", cache.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Watch disk hits
    // ─────────────────────────────────────────────────────────────────────────
    let mut hits = cache.subscribe_access();
    let watcher = tokio::spawn(async move {
        while let Some(count) = hits.next().await {
            println!("   👀 disk access count → {}", count);
        }
        println!("   👀 access stream closed");
    });

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Remote, then memory
    // ─────────────────────────────────────────────────────────────────────────
    let keys = ["emoji/smile.png", "emoji/heart.png", "emoji/fire.png"];
    println!("\n🌐 First fetch (remote):");
    for key in keys {
        let start = Instant::now();
        let item = cache.fetch(key).await?;
        println!("   └─ {} → {} bytes ({:?})", key, item.len(), start.elapsed());
    }

    println!("\n⚡ Second fetch (memory):");
    for key in keys {
        let start = Instant::now();
        cache.fetch(key).await?;
        println!("   └─ {} ({:?})", key, start.elapsed());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Drop memory, read from disk
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n💾 After clear_memory (disk):");
    cache.clear_memory().await?;
    for key in keys {
        let start = Instant::now();
        cache.fetch(key).await?;
        println!("   └─ {} ({:?})", key, start.elapsed());
    }
    println!("   Disk accesses: {}", cache.access_count());

    // ─────────────────────────────────────────────────────────────────────────
    // 5. TimeoutGuard on its own
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n⏱️  TimeoutGuard:");
    let quick = TimeoutGuard::new(Duration::from_millis(100), || async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, String>("fast enough")
    });
    println!("   └─ quick: {:?}", quick.value().await);

    let slow = TimeoutGuard::new(Duration::from_millis(20), || async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, String>("never")
    });
    match slow.value().await {
        Err(GuardError::Timeout(d)) => println!("   └─ slow: timed out after {:?}", d),
        other => println!("   └─ slow: {:?}", other),
    }

    let cancelled = TimeoutGuard::new(Duration::from_secs(10), || async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, String>("never")
    });
    let handle = cancelled.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.cancel();
    });
    println!("   └─ cancelled: {:?}", cancelled.value().await);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 7. Restart, clear, shutdown
    // ─────────────────────────────────────────────────────────────────────────
    cache.shutdown().await;
    watcher.await?;

    println!("\n🔁 Restarting over the same directory...");
    let restarted = boot(&config).await?;
    println!("   └─ {} blobs indexed", restarted.persisted_len().await);
    restarted.fetch(keys[0]).await?;
    println!("   └─ disk accesses after one fetch: {}", restarted.access_count());

    restarted.clear().await?;
    println!("   └─ after clear: {} indexed, {} accesses",
        restarted.persisted_len().await, restarted.access_count());
    restarted.shutdown().await;

    println!("\n✅ Done");
    Ok(())
}

/// Dump all captured metrics
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        let rendered = match value {
            DebugValue::Counter(v) => format!("{}", v),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.4}", count, sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }

    lines.sort();
    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
