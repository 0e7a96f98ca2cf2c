use std::fs;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;

use btool_engine::{prune, restore, snap, PatternIgnore};
use btool_snaps::SnapCatalog;
use btool_store::RepoLayout;

use crate::cli::{Cli, Command, ListArgs, PruneArgs, RestoreArgs, SnapArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Snap(args) => cmd_snap(args),
        Command::List(args) => cmd_list(args),
        Command::Restore(args) => cmd_restore(args),
        Command::Prune(args) => cmd_prune(args),
    }
}

fn cmd_snap(args: SnapArgs) -> anyhow::Result<()> {
    let dir = Path::new(&args.dir);
    let rules = PatternIgnore::load(dir);
    println!("Snapping {}...", args.dir.bold());

    let report = snap(dir, &rules, &args.message)
        .with_context(|| format!("could not snap {}", args.dir))?;

    println!("{} Snap {} complete", "✓".green().bold(), report.id);
    println!("  Snap hash:      {}", report.snap_digest.short_hex().yellow());
    println!("  Root tree hash: {}", report.root_tree_hash.short_hex().yellow());
    println!(
        "  {} file(s), {} source, {} added",
        report.file_count,
        format_bytes(report.source_size, 2),
        format_bytes(report.snap_size, 2),
    );
    Ok(())
}

fn cmd_list(args: ListArgs) -> anyhow::Result<()> {
    let dir = Path::new(&args.dir);
    let snaps = SnapCatalog::new(dir)
        .list()
        .with_context(|| format!("could not list snapshots of {}", args.dir))?;

    if snaps.is_empty() {
        println!("No snaps found for \"{}\".", args.dir);
        return Ok(());
    }

    println!("Snaps for \"{}\":", args.dir);
    println!(
        "{:<10} {:<10} {:<22} {:<12} {:<12} MESSAGE",
        "SNAPSHOT", "HASH", "TIMESTAMP", "SOURCE SIZE", "SNAP SIZE"
    );
    for snap in &snaps {
        println!(
            "{:<10} {:<10} {:<22} {:<12} {:<12} {}",
            snap.id,
            snap.digest.short_hex(),
            snap.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format_bytes(snap.source_size, 2),
            format_bytes(snap.snap_size, 2),
            snap.message,
        );
    }
    println!(
        "\nTotal stored size of all objects: {}",
        format_bytes(stored_pack_size(dir)?, 2)
    );
    Ok(())
}

fn cmd_restore(args: RestoreArgs) -> anyhow::Result<()> {
    let output = args.output.clone().unwrap_or_else(|| args.dir.clone());
    println!(
        "Restoring {} into {}...",
        args.identifier.yellow(),
        output.bold()
    );

    restore(Path::new(&args.dir), &args.identifier, Path::new(&output))
        .with_context(|| format!("could not restore snapshot {}", args.identifier))?;

    println!("{} Restore complete", "✓".green().bold());
    Ok(())
}

fn cmd_prune(args: PruneArgs) -> anyhow::Result<()> {
    println!(
        "Pruning snaps of {} older than {}...",
        args.dir.bold(),
        args.identifier.yellow()
    );

    let report = prune(Path::new(&args.dir), &args.identifier)
        .with_context(|| format!("could not prune {}", args.dir))?;

    if report.pruned == 0 {
        println!("No snapshots older than the specified one to prune.");
    } else {
        println!("{} Prune complete", "✓".green().bold());
        println!(
            "  Deleted {} old snap(s); {} kept, {} live object(s).",
            report.pruned, report.kept, report.live_objects
        );
    }
    Ok(())
}

/// Total size of all packfiles on disk, zero if none exist yet.
fn stored_pack_size(dir: &Path) -> anyhow::Result<u64> {
    let packs_dir = RepoLayout::new(dir).packs_dir();
    let entries = match fs::read_dir(&packs_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).context("could not read packs directory"),
    };
    let mut total = 0;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Render a byte count as a human-readable size.
fn format_bytes(bytes: u64, decimals: usize) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    format!("{value:.decimals$} {}", UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_zero() {
        assert_eq!(format_bytes(0, 2), "0 Bytes");
    }

    #[test]
    fn format_bytes_small() {
        assert_eq!(format_bytes(512, 0), "512 Bytes");
    }

    #[test]
    fn format_bytes_kilobytes() {
        assert_eq!(format_bytes(2048, 2), "2.00 KB");
    }

    #[test]
    fn format_bytes_megabytes() {
        assert_eq!(format_bytes(5 * 1024 * 1024, 1), "5.0 MB");
    }

    #[test]
    fn format_bytes_caps_at_largest_unit() {
        let huge = 1024u64.pow(4) * 2048;
        assert!(format_bytes(huge, 0).ends_with("TB"));
    }

    #[test]
    fn stored_pack_size_missing_dir_is_zero() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(stored_pack_size(tmp.path()).unwrap(), 0);
    }

    #[test]
    fn stored_pack_size_sums_files() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RepoLayout::new(tmp.path());
        layout.ensure().unwrap();
        fs::write(layout.packs_dir().join("aa"), vec![0u8; 10]).unwrap();
        fs::write(layout.packs_dir().join("bb"), vec![0u8; 32]).unwrap();
        assert_eq!(stored_pack_size(tmp.path()).unwrap(), 42);
    }
}
