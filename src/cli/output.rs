//! Human-readable rendering for CLI reports.

use crate::config::ModeRecord;
use crate::errors::Severity;
use crate::store::HealthStatus;
use crate::validation::Report;

/// Render the `status` report: configured mode, live health, findings.
pub fn print_status(
    record: Option<&ModeRecord>,
    health: Option<&HealthStatus>,
    report: &Report,
) {
    println!("modekeeper status");
    println!("{}", "-".repeat(60));

    match record {
        Some(record) => {
            println!("mode:           {}", record.mode);
            println!("auto-unseal:    {}", record.auto_unseal);
            println!("launch command: {}", record.launch_command);
            println!(
                "updated:        {} by {}",
                record.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                record.updated_by
            );
        }
        None => println!("mode:           ephemeral (default; no mode record)"),
    }

    match health {
        Some(health) => println!(
            "store:          initialized={} sealed={}",
            health.initialized, health.sealed
        ),
        None => println!("store:          unreachable"),
    }

    println!();
    println!("checks ({}):", report.overall());
    for finding in &report.findings {
        println!("  [{}] {}: {}", finding.severity, finding.code, finding.message);
        if let Some(remediation) = &finding.remediation {
            if finding.severity != Severity::Pass {
                println!("         fix: {}", remediation);
            }
        }
    }
}

/// Render the snapshot table for `backup list`.
pub fn print_snapshots(snapshots: &[crate::backup::SnapshotMetadata]) {
    if snapshots.is_empty() {
        println!("No snapshots found");
        return;
    }

    println!("{:<24} {:<12} {:>8} {:>8}  {}", "ID", "Source", "Entries", "Omitted", "Created");
    println!("{}", "-".repeat(80));
    for snapshot in snapshots {
        println!(
            "{:<24} {:<12} {:>8} {:>8}  {}",
            snapshot.id,
            snapshot.source_mode.to_string(),
            snapshot.entry_count,
            snapshot.omitted,
            snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}
