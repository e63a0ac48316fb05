//! Docslice CLI - split documents into retrieval-sized chunks.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Docslice - document chunking for retrieval pipelines
#[derive(Parser)]
#[command(name = "docslice")]
#[command(version)]
#[command(about = "Split docx, markdown and PDF documents into chunks", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default one
    #[arg(short, long, global = true, env = "DOCSLICE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize docslice (create config and image directory)
    Init,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Parse a file or directory into chunks
    Parse {
        /// Path to a document or a directory of documents
        path: PathBuf,

        /// Print chunks as JSON
        #[arg(long)]
        json: bool,

        /// Write the JSON chunks to a file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for extracted images
        #[arg(long)]
        images_dir: Option<PathBuf>,

        /// Override the maximum chunk size
        #[arg(long)]
        max_chunk_size: Option<usize>,

        /// Override the chunk overlap
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Show the sections detected in a document
    Sections {
        /// Path to the document
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., chunking.max_chunk_size)
        key: String,

        /// Value to set
        value: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docslice=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docslice=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_file = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init => commands::init::run(config_file),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(config_file),
            ConfigCommands::Path => commands::config::path(config_file),
            ConfigCommands::Set { key, value } => commands::config::set(config_file, &key, &value),
        },
        Commands::Parse {
            path,
            json,
            output,
            images_dir,
            max_chunk_size,
            overlap,
        } => commands::parse::run(
            &path,
            config_file,
            commands::parse::ParseOptions {
                json,
                output,
                images_dir,
                max_chunk_size,
                overlap,
            },
        ),
        Commands::Sections { file } => commands::sections::run(&file, config_file),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
