//! Main entry point for the zwz CLI app

use std::time::Instant;

use zwz::cli::{self, Commands};
use zwz::compress::{self, CompressOptions};
use zwz::extract;

fn main() -> std::process::ExitCode {
    env_logger::init();
    if let Err(e) = run_app() {
        eprintln!("Error: {}", e);
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn run_app() -> Result<(), Box<dyn std::error::Error>> {
    let command = cli::run();
    let start = Instant::now();

    let operation = match &command {
        Commands::Compress {
            input,
            output,
            threads,
            rank,
            processes,
            manifest,
            embed_manifest,
        } => {
            let opts = CompressOptions {
                threads: *threads,
                rank: *rank,
                process_count: *processes,
                manifest: manifest.clone(),
                embed_manifest: *embed_manifest,
            };
            let report = compress::run(input, output, &opts)?;
            println!(
                "[zwz] rank {}: {} files in, {} skipped, {} records out",
                rank, report.files_assigned, report.files_skipped, report.records_written
            );
            "compress"
        }
        Commands::Decompress {
            input,
            output,
            threads,
        } => {
            let report = extract::run(input, output, *threads)?;
            println!(
                "[zwz] {} files restored, {} quarantined, {} corrupt",
                report.files_restored, report.digest_mismatches, report.corrupt_files
            );
            "decompress"
        }
    };

    println!("========================================");
    println!("Operation: {}", operation);
    println!("Time taken: {:.2} seconds", start.elapsed().as_secs_f64());
    println!("========================================");
    Ok(())
}
