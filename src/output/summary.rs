//! Console summaries of runs and discovery passes

use crate::extract::ExtractionResult;
use crate::pipeline::ProcessingOutcome;

/// Prints a run's outcome to stdout
pub fn print_summary(outcome: &ProcessingOutcome) {
    let counts = &outcome.counts;

    println!("=== Relocation Summary ===\n");

    println!("Overview:");
    println!("  Base URL: {}", outcome.base_url);
    println!("  Resources found: {}", counts.total);
    println!(
        "  Relocated: {} ({} already in store)",
        counts.succeeded, counts.deduplicated
    );
    println!("  Failed: {}", counts.failed);
    if counts.cancelled > 0 {
        println!("  Cancelled: {}", counts.cancelled);
    }
    println!("  Elapsed: {:.2}s", outcome.elapsed.as_secs_f64());
    println!();

    let failures: Vec<_> = outcome.failures().collect();
    if !failures.is_empty() {
        println!("Failures ({}):", failures.len());
        for (resource, failure) in failures {
            println!(
                "  - {} [{} {}] {}",
                resource.resolved_url,
                failure.stage(),
                failure.kind(),
                failure.message()
            );
        }
        println!();
    }

    if !outcome.extraction_errors.is_empty() {
        println!("Unresolvable references: {}", outcome.extraction_errors.len());
    }
    if !outcome.replacement_skips.is_empty() {
        println!(
            "Relocated but not rewritten: {}",
            outcome.replacement_skips.len()
        );
    }

    let success_rate = if counts.total > 0 {
        (counts.succeeded as f64 / counts.total as f64) * 100.0
    } else {
        100.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} resources relocated)",
        success_rate, counts.succeeded, counts.total
    );
}

/// Prints what a dry run discovered, without touching the network
pub fn print_discovery(extraction: &ExtractionResult) {
    println!("=== Discovered Resources ({}) ===\n", extraction.occurrences.len());

    for occurrence in &extraction.occurrences {
        let mut line = format!(
            "  [{}] {} ({})",
            occurrence.kind, occurrence.resolved_url, occurrence.element
        );
        if occurrence.duplicates > 0 {
            line.push_str(&format!(" x{}", occurrence.duplicates + 1));
        }
        if let Some(label) = occurrence.context.label() {
            line.push_str(&format!(" \"{}\"", label));
        }
        println!("{}", line);
    }

    if !extraction.errors.is_empty() {
        println!("\nUnresolvable references ({}):", extraction.errors.len());
        for error in &extraction.errors {
            println!("  - {} in {}: {}", error.raw, error.element, error.reason);
        }
    }
}

