//! Stowkey - object keys, uploads and signed URLs from the command line

mod commands;
mod config;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use commands::CommandContext;
use config::ConfigStore;
use std::path::PathBuf;
use stowkey_core::types::{CannedAcl, SignOperation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "stowkey")]
#[command(author = "Stowkey Team")]
#[command(version = stowkey_core::VERSION)]
#[command(about = "Build object keys, upload files and sign URLs for S3 buckets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Profile from the config file
    #[arg(short, long, global = true, env = "STOWKEY_PROFILE", default_value = "default")]
    profile: String,

    /// Config file path (defaults to ~/.stowkey/config.toml)
    #[arg(short, long, global = true, env = "STOWKEY_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print results
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STOWKEY_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a hierarchical object key
    Key {
        /// Base module (users, groups, ...)
        base: String,

        /// Original file name; only its extension is kept
        filename: String,

        /// Owner identifier
        #[arg(long)]
        id: Option<String>,

        /// Sub-module below the identifier
        #[arg(short, long)]
        module: Option<String>,

        /// Fixed leaf name instead of a random one
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print the public URL of a key
    Url {
        key: String,

        /// Key is already prefixed (as returned by an upload)
        #[arg(long)]
        stored: bool,
    },

    /// Upload a file, or stdin with "-"
    Upload {
        file: String,

        key: String,

        #[arg(long, value_parser = parse_acl)]
        acl: Option<CannedAcl>,

        #[arg(long)]
        content_type: Option<String>,

        #[arg(long)]
        cache_control: Option<String>,

        /// User metadata as key=value, repeatable
        #[arg(long = "meta", value_parser = utils::parse_metadata)]
        metadata: Vec<(String, String)>,
    },

    /// Issue a pre-signed URL
    Presign {
        key: String,

        #[arg(short, long, default_value = "get", value_parser = parse_operation)]
        method: SignOperation,

        /// Lifetime in seconds (0 = configured default)
        #[arg(short, long)]
        expires: Option<u64>,

        /// ACL bound into PUT URLs
        #[arg(long, value_parser = parse_acl)]
        acl: Option<CannedAcl>,

        /// Content type bound into PUT URLs
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Show object metadata
    Info {
        key: String,

        #[arg(long)]
        stored: bool,
    },

    /// Download an object
    Get {
        key: String,

        /// Destination file (stdout when absent)
        #[arg(short = 'O', long = "out")]
        out: Option<PathBuf>,

        #[arg(long)]
        stored: bool,
    },

    /// Remove an object
    Rm {
        key: String,

        #[arg(long)]
        stored: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Manage profiles
    Configure {
        #[command(subcommand)]
        action: Option<ConfigureAction>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigureAction {
    /// Set a value in the current profile
    Set { key: String, value: String },
    /// Get a value from the current profile
    Get { key: String },
    /// List the current profile and all profiles
    List,
    /// Create an empty profile
    AddProfile { name: String },
    /// Delete a profile
    RemoveProfile { name: String },
}

fn parse_acl(s: &str) -> std::result::Result<CannedAcl, String> {
    s.parse()
}

fn parse_operation(s: &str) -> std::result::Result<SignOperation, String> {
    s.parse()
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_store = ConfigStore::open(cli.config.clone())?;
    let context = || -> Result<CommandContext> {
        Ok(CommandContext {
            config: config_store.load_profile(&cli.profile)?,
            output_format: cli.output,
            verbose: cli.verbose,
            quiet: cli.quiet,
        })
    };

    match cli.command {
        Commands::Key {
            base,
            filename,
            id,
            module,
            name,
        } => commands::key::execute(&context()?, &base, &filename, id, module, name),
        Commands::Url { key, stored } => commands::url::execute(&context()?, &key, stored),
        Commands::Upload {
            file,
            key,
            acl,
            content_type,
            cache_control,
            metadata,
        } => {
            let opts = commands::upload::UploadArgs {
                acl,
                content_type,
                cache_control,
                metadata,
            };
            commands::upload::execute(&context()?, &file, &key, opts).await
        }
        Commands::Presign {
            key,
            method,
            expires,
            acl,
            content_type,
        } => {
            commands::presign::execute(&context()?, &key, method, expires, acl, content_type).await
        }
        Commands::Info { key, stored } => commands::info::execute(&context()?, &key, stored).await,
        Commands::Get { key, out, stored } => {
            commands::get::execute(&context()?, &key, out.as_deref(), stored).await
        }
        Commands::Rm { key, stored, force } => {
            commands::rm::execute(&context()?, &key, stored, force).await
        }
        Commands::Configure { action } => {
            commands::configure::execute(&config_store, &cli.profile, action)
        }
    }
}
