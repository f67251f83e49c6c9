//! editlog Viewer Binary
//!
//! Converts edit log segments between binary and textual form, generates
//! sample segments, and reports per-opcode statistics.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use editlog::generator::generate_segment;
use editlog::transcode::{collect_statistics, convert, ProcessorKind};
use editlog::{Config, EditLogError, OpCode, ScanMode};
use tracing_subscriber::{fmt, EnvFilter};

/// editlog Viewer
#[derive(Parser, Debug)]
#[command(name = "editlog-viewer")]
#[command(about = "Inspect and convert namespace edit log segments")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a segment between binary and textual form
    Convert {
        /// Input segment (binary or textual, detected automatically)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Processor: binary, text or stats
        #[arg(short, long, default_value = "text")]
        processor: ProcessorKind,

        /// Skip damaged regions instead of failing
        #[arg(short, long)]
        recover: bool,
    },

    /// Write a segment exercising every live opcode
    Generate {
        /// Output segment
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print per-opcode counts and the completeness flag
    Stats {
        /// Input segment
        #[arg(short, long)]
        input: PathBuf,

        /// Extra opcodes to leave out of the completeness check
        #[arg(short, long)]
        exclude: Vec<OpCode>,

        /// Skip damaged regions instead of failing
        #[arg(short, long)]
        recover: bool,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,editlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("editlog-viewer v{}", editlog::VERSION);

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn scan_mode(recover: bool) -> ScanMode {
    if recover {
        ScanMode::Recovery
    } else {
        ScanMode::Strict
    }
}

fn run(command: Commands) -> Result<(), EditLogError> {
    let config = Config::default();

    match command {
        Commands::Convert {
            input,
            output,
            processor,
            recover,
        } => {
            let report = convert(&input, &output, processor, scan_mode(recover), &config)?;
            println!("records: {}", report.records);
            if let Some(scan) = &report.scan {
                println!("recovery_invoked: {}", scan.recovery_invoked);
                println!("trusted_range: {:?}", scan.trusted_range());
                if let Some(e) = &scan.first_error {
                    println!("first_error: {}", e);
                }
            }
        }
        Commands::Generate { output } => {
            let last_txid = generate_segment(&output, &config)?;
            println!("wrote {} (last txid {})", output.display(), last_txid);
        }
        Commands::Stats {
            input,
            exclude,
            recover,
        } => {
            let (collector, scan) = collect_statistics(&input, scan_mode(recover), &config)?;
            let mut excluded: BTreeSet<OpCode> = OpCode::obsolete_set();
            excluded.extend(exclude);

            print!("{}", collector.statistics_string());
            println!("total: {}", collector.total());
            println!("complete: {}", collector.is_complete(&excluded));
            for missing in collector.missing(&excluded) {
                println!("missing: {}", missing);
            }
            if let Some(scan) = scan.filter(|s| s.recovery_invoked) {
                println!("recovery_invoked: true");
                println!("trusted_range: {:?}", scan.trusted_range());
            }
        }
    }
    Ok(())
}
