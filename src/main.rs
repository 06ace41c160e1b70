// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "cas-sharpen")]
#[command(about = "Contrast adaptive sharpening on the GPU")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available GPU adapters
    Adapters,

    /// Sharpen images as frames of one stream
    Sharpen {
        /// Input images; the first one fixes the stream geometry
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory the sharpened PNGs are written to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Adapter index to use (from 'cas-sharpen adapters')
        #[arg(short, long)]
        adapter: Option<i64>,

        /// Sharpness between 0.0 and 1.0
        #[arg(short, long)]
        sharpness: Option<f32>,

        /// Prefer the reduced-precision kernel
        #[arg(long)]
        fp16: bool,

        /// Change sharpness by this amount after every frame
        #[arg(long)]
        sharpness_step: Option<f32>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=cas_sharpen=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Adapters => cli::list_adapters(),
        Commands::Sharpen {
            inputs,
            output_dir,
            config,
            adapter,
            sharpness,
            fp16,
            sharpness_step,
        } => cli::sharpen_images(cli::SharpenArgs {
            inputs,
            output_dir,
            config,
            adapter,
            sharpness,
            fp16,
            sharpness_step,
        }),
    }
}
