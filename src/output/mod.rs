//! Output module for run summaries and statistics
//!
//! This module handles:
//! - Live outcome counters shared by the workers
//! - Printing the summary of a finished harvest
//! - Reading back and printing stored statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics, HarvestCounters, HarvestStats};

use crate::crawler::CrawlSummary;

/// Prints the summary of a finished harvest to stdout
pub fn print_summary(summary: &CrawlSummary) {
    let stats = &summary.stats;

    println!("=== Harvest Summary ===\n");

    if summary.cancelled {
        println!("Run was cancelled before completion.\n");
    }

    println!("Discovery:");
    println!(
        "  Seeds visited: {} of {}",
        summary.seeds_visited, summary.seeds_total
    );
    println!("  Seeds failed: {}", summary.seeds_failed);
    println!("  Work items discovered: {}", summary.items_discovered);
    println!();

    println!("Extraction:");
    println!("  Records emitted: {}", stats.records_emitted);
    println!("  Attempts: {}", stats.attempts);
    println!("  Retries scheduled: {}", stats.retries_scheduled);
    println!();

    if stats.extraction_failures() > 0 || stats.sink_failures > 0 {
        println!("Failures:");
        println!("  Missing identity: {}", stats.identity_failures);
        println!("  No geo data: {}", stats.geo_absent);
        println!("  Detail fetch failed: {}", stats.geo_fetch_failures);
        println!("  Abandoned after retries: {}", stats.items_abandoned);
        println!("  Sink errors: {}", stats.sink_failures);
        println!();
    }

    println!("Workers:");
    for worker in &summary.workers {
        println!(
            "  #{}: {} ({} items)",
            worker.id, worker.final_state, worker.processed
        );
    }
    println!();

    println!("Elapsed: {:.2}s", summary.elapsed.as_secs_f64());
}
