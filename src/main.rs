// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "alpha-player")]
#[command(about = "Transparent playback of packed alpha videos")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite one packed [alpha | color] image into a transparent PNG
    Composite {
        /// Packed input image
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Grading hue in [0, 1]
        #[arg(long)]
        hue: Option<f32>,

        /// Disable color grading
        #[arg(long)]
        no_grade: bool,

        /// Blend factor back toward the original color
        #[arg(long)]
        mix: Option<f32>,
    },

    /// Decode a packed video and write presented frames as PNGs
    Render {
        /// File path or http(s) URL
        input: String,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Grading hue in [0, 1]
        #[arg(long)]
        hue: Option<f32>,

        /// Disable color grading
        #[arg(long)]
        no_grade: bool,

        /// Save every Nth presented frame
        #[arg(long, default_value = "1")]
        every: u64,
    },

    /// Print the effective configuration
    Config {
        /// Print the config file path instead
        #[arg(long)]
        path: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=alpha_player=debug
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
        Commands::Composite {
            input,
            output,
            hue,
            no_grade,
            mix,
        } => cli::composite_image(&input, &output, &cli::GradeArgs { hue, no_grade, mix }),
        Commands::Render {
            input,
            output,
            hue,
            no_grade,
            every,
        } => cli::render_video(
            &input,
            output,
            every,
            &cli::GradeArgs {
                hue,
                no_grade,
                mix: None,
            },
        ),
        Commands::Config { path } => cli::show_config(path),
    }
}
