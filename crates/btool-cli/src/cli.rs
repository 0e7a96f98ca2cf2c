use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "btool",
    about = "Content-addressed, deduplicating snapshots for local directory trees",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new snapshot of a directory
    Snap(SnapArgs),
    /// List the snapshots of a directory
    List(ListArgs),
    /// Restore a snapshot exactly into a directory
    Restore(RestoreArgs),
    /// Delete snapshots older than the given one and reclaim space
    Prune(PruneArgs),
}

#[derive(Args)]
pub struct SnapArgs {
    /// Directory to snapshot
    #[arg(default_value = ".")]
    pub dir: String,

    /// Message recorded with the snapshot
    #[arg(short, long, default_value = "")]
    pub message: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Directory whose snapshots to list
    #[arg(default_value = ".")]
    pub dir: String,
}

#[derive(Args)]
pub struct RestoreArgs {
    /// Snapshot ID or digest prefix
    pub identifier: String,

    /// Directory containing the snapshot repository
    #[arg(short = 'd', long = "dir", default_value = ".")]
    pub dir: String,

    /// Directory to restore into (defaults to the repository directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,
}

#[derive(Args)]
pub struct PruneArgs {
    /// Oldest snapshot to keep (ID or digest prefix)
    pub identifier: String,

    /// Directory containing the snapshot repository
    #[arg(default_value = ".")]
    pub dir: String,
}
