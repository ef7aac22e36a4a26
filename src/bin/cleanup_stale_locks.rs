//! Utility to remove lock files left behind by crashed writers.
//!
//! Only locks older than `LOCK_STALE_MS` are removed; pass `--dry-run` to list
//! them without deleting.

use company_intel_api::config::{lock_stale_ms_from_env, storage_dir_from_env};
use company_intel_api::file_lock::lock_age;
use std::time::Duration;

/// Main entry point for the lock cleanup utility.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let dry_run = std::env::args().any(|arg| arg == "--dry-run");
    let dir = storage_dir_from_env();
    let stale_after = Duration::from_millis(lock_stale_ms_from_env()?);

    println!(
        "Scanning {} for locks older than {:?}{}",
        dir.display(),
        stale_after,
        if dry_run { " (dry run)" } else { "" }
    );

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("Storage directory does not exist, nothing to do");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    let mut kept = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("lock") {
            continue;
        }

        let Some(age) = lock_age(&path) else {
            continue;
        };
        if age <= stale_after {
            println!("  keep   {} ({:.1}s old)", path.display(), age.as_secs_f64());
            kept += 1;
            continue;
        }

        if dry_run {
            println!("  stale  {} ({:.1}s old)", path.display(), age.as_secs_f64());
        } else {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => println!("  removed {} ({:.1}s old)", path.display(), age.as_secs_f64()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        removed += 1;
    }

    println!(
        "✓ {} stale lock(s) {}, {} active lock(s) kept",
        removed,
        if dry_run { "found" } else { "removed" },
        kept
    );
    Ok(())
}
