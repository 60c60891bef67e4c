//! Directory tree walk - one task per directory, one per file
//!
//! Every directory task schedules its children instead of recursing, so the
//! walk spreads over the pool. Per-extension totals are collected in a shared
//! inventory that each task receives explicitly.
//!
//! Run with: `RUST_LOG=threadqueue=debug cargo run --example tree_walk -- <dir>`

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use threadqueue::prelude::*;

#[derive(Debug, Default)]
struct Inventory {
    by_extension: Mutex<BTreeMap<String, (u64, u64)>>,
    directories: Mutex<u64>,
}

impl Inventory {
    fn record(&self, extension: String, bytes: u64) {
        let mut map = self.by_extension.lock();
        let entry = map.entry(extension).or_default();
        entry.0 += 1;
        entry.1 += bytes;
    }
}

fn scan_dir(queue: &TaskQueue, inventory: Arc<Inventory>, dir: PathBuf) -> TaskResult {
    *inventory.directories.lock() += 1;

    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let inventory = inventory.clone();

        if path.is_dir() {
            let child = path.clone();
            queue.enqueue(
                Task::new("scan_dir", move |q: &TaskQueue| scan_dir(q, inventory, child))
                    .arg(&path),
            );
        } else {
            let file = path.clone();
            queue.enqueue(
                Task::new("record_file", move |_: &TaskQueue| record_file(&inventory, &file))
                    .arg(&path),
            );
        }
    }

    Ok(())
}

fn record_file(inventory: &Inventory, path: &Path) -> TaskResult {
    let bytes = fs::metadata(path)?.len();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "(none)".to_string());

    inventory.record(extension, bytes);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    println!("=== Tree Walk Example ===\n");
    println!("Scanning {}", root.display());

    let config = Config::default();
    let inventory = Arc::new(Inventory::default());

    let stats = {
        let mut pool = WorkerPool::start(&config).expect("Failed to start worker pool");
        println!("Using {} worker threads\n", pool.num_threads());

        let walk = inventory.clone();
        let start = root.clone();
        pool.queue().enqueue(
            Task::new("scan_dir", move |q: &TaskQueue| scan_dir(q, walk, start)).arg(&root),
        );

        pool.close().expect("Worker pool did not shut down cleanly");
        pool.stats()
    };

    println!("Directories: {}", inventory.directories.lock());
    for (extension, (count, bytes)) in inventory.by_extension.lock().iter() {
        println!("  {extension:>10}: {count:>6} files, {bytes:>12} bytes");
    }
    println!(
        "\nTasks: {} ok, {} failed, {} panicked",
        stats.executed, stats.failed, stats.panicked
    );
}
