//! Symdex CLI - keeps a symbol index in sync with a project and its files

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use symdex::config::{self, IndexerConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "symdex")]
#[command(version)]
#[command(about = "Concurrent symbol indexer - a SQLite symbol index kept in sync with your sources")]
#[command(long_about = r#"
Symdex indexes the symbols of a project's source files into SQLite and keeps
the index current as project parts and files change.

Example usage:
  symdex init
  symdex index --project project.toml --watch
  symdex find --name parse_header
  symdex locations --symbol 42
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./symdex.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Index database, overriding the config file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Print machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the project parts listed in a project file
    Index {
        /// Project file with [[project_parts]] tables
        #[arg(short, long)]
        project: PathBuf,

        /// Keep running and reindex files as they change
        #[arg(short, long)]
        watch: bool,
    },

    /// List the symbols recorded for a file
    Symbols {
        /// Source file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List the locations of a symbol
    Locations {
        /// Symbol id, as shown by `symbols` or `find`
        #[arg(short, long)]
        symbol: i64,
    },

    /// Find symbols by name
    Find {
        /// Exact symbol name
        #[arg(short, long)]
        name: String,
    },

    /// Show statistics about the index
    Stats,

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print a JSON envelope for a successful command
pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = config::load_config(Some(&config_path))?.unwrap_or_default();
    if let Some(database) = cli.database {
        config.database = database;
    }

    init_logging(cli.verbose, &config);
    tracing::debug!(config = %config_path.display(), database = %config.database.display(), "loaded configuration");

    let result = match cli.command {
        Commands::Index { project, watch } => commands::run_index(&config, &project, watch, output_mode),
        Commands::Symbols { file } => commands::run_symbols(&config, &file, output_mode),
        Commands::Locations { symbol } => commands::run_locations(&config, symbol, output_mode),
        Commands::Find { name } => commands::run_find(&config, &name, output_mode),
        Commands::Stats => commands::run_stats(&config, output_mode),
        Commands::Init { force } => commands::run_init(&config_path, &config, force, output_mode),
    };

    if let Err(e) = &result {
        match output_mode {
            OutputMode::Human => symdex::ui::error(&format!("{:#}", e)),
            OutputMode::Json => {
                let envelope = serde_json::json!({
                    "ok": false,
                    "error": format!("{:#}", e),
                });
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            }
        }
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: bool, config: &IndexerConfig) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
