#![forbid(unsafe_code)]
//! Build and verify hash chains from the command line.

use clap::{Parser, Subcommand};
use colored::*;
use hashchain::cli::{render_report, run_bench, run_demo};
use hashchain::config::{load_config_from, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds a chain of random blocks and validates it
    Bench {
        /// Number of blocks to derive after genesis
        #[arg(long)]
        blocks: Option<usize>,
        /// Seed for reproducible payloads
        #[arg(long)]
        seed: Option<u64>,
        /// Verification threads
        #[arg(long)]
        threads: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Builds a two-block chain, tampers with it and shows the verdict
    Demo,
    /// Prints the effective configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config_from(&cli.config)?;

    match cli.command {
        Commands::Bench {
            blocks,
            seed,
            threads,
            json,
            no_progress,
        } => {
            if let Some(blocks) = blocks {
                config.bench.blocks = blocks;
            }
            if seed.is_some() {
                config.bench.seed = seed;
            }
            if let Some(threads) = threads {
                config.verify.threads = threads;
            }

            if !json {
                println!(
                    "{}",
                    format!(
                        "⛓️  Building {} blocks ({}, {} data bytes)...",
                        config.bench.blocks, config.chain.hash, config.chain.data_size
                    )
                    .bright_cyan()
                );
            }

            let report = run_bench(&config, !json && !no_progress)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render_report(&report));
                println!("{}", "✅ Chain is valid".bright_green().bold());
            }
        }
        Commands::Demo => {
            let outcome = run_demo()?;
            println!("{}", "Two-block chain".bright_cyan().underline());
            println!("  genesis digest: {}", hex::encode(&outcome.genesis_digest).dimmed());
            println!("  block 1 digest: {}", hex::encode(&outcome.block_digest).bright_white());
            println!();
            println!(
                "{}",
                format!("Flipped one bit at byte offset {}", outcome.tampered_offset).yellow()
            );
            match outcome.violation {
                Some(violation) => {
                    println!("{} {}", "❌ Rejected:".bright_red().bold(), violation);
                }
                None => {
                    return Err("tampered chain was accepted".into());
                }
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
