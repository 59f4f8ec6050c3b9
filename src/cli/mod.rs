use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Compress a directory tree into per-process chunked archives.
    #[command(alias = "c")]
    Compress {
        /// Directory whose files will be archived.
        input: PathBuf,

        /// Directory where the archive and the size-sorted manifest are written.
        output: PathBuf,

        /// Number of compression worker threads. [0 = auto-detect based on CPU cores]
        #[arg(long, default_value_t = 0)]
        threads: usize,

        /// Rank of this process in a cooperating multi-process run.
        #[arg(long, default_value_t = 0)]
        rank: usize,

        /// Total number of cooperating processes. Each rank takes the manifest
        /// entries with `index mod processes == rank`.
        #[arg(long, default_value_t = 1)]
        processes: usize,

        /// Use a pre-built manifest instead of scanning the input directory.
        /// Required for ranks other than 0 so all processes share one listing.
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Embed the manifest as the first record of rank 0's archive.
        #[arg(long)]
        embed_manifest: bool,
    },

    /// Rebuild the original tree from every .zwz archive in a directory.
    #[command(alias = "x")]
    Decompress {
        /// Directory containing the .zwz archives.
        input: PathBuf,

        /// Directory where the original relative paths are recreated.
        output: PathBuf,

        /// Number of archives to process in parallel. [0 = one thread per archive]
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
}

/// Parse the command line, exiting with clap's own diagnostics on error.
pub fn run() -> Commands {
    Args::parse().command
}
