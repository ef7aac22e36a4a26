//! Utility to inspect the store files and print record counts and lock state.

use company_intel_api::config::storage_dir_from_env;
use company_intel_api::file_lock::{lock_age, LockSettings};
use company_intel_api::storage::{CompetitorStore, LeadStore};
use std::path::Path;

fn describe_lock(lock_path: &Path) -> String {
    match lock_age(lock_path) {
        Some(age) => format!("held ({:.1}s old)", age.as_secs_f64()),
        None => "free".to_string(),
    }
}

/// Main entry point for the store inspection utility.
///
/// Reads both stores from `STORAGE_DIR` without taking their locks.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let dir = storage_dir_from_env();
    let settings = LockSettings::default();
    println!("Storage directory: {}", dir.display());

    let leads = LeadStore::new(&dir, settings);
    let lead_records = leads.get_all().await?;
    println!("\nLeads: {}", leads.file().path().display());
    println!("  records: {}", lead_records.len());
    println!("  lock:    {}", describe_lock(leads.file().lock_path()));
    for lead in &lead_records {
        println!("  - {} ({})", lead.company_name, lead.search_query);
    }

    let competitors = CompetitorStore::new(&dir, settings);
    let competitor_records = competitors.get_all().await?;
    println!("\nEnriched competitors: {}", competitors.file().path().display());
    println!("  records: {}", competitor_records.len());
    println!("  lock:    {}", describe_lock(competitors.file().lock_path()));
    for competitor in &competitor_records {
        println!(
            "  - {} [{}] {} employees, {} jobs, source {}",
            competitor.company_name,
            competitor.tier,
            competitor.employee_count,
            competitor.job_count(),
            competitor.enrichment_source
        );
    }

    Ok(())
}
