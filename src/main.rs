//! cachewarden: declarative nginx cache management.
//!
//! Turns a YAML list of upstream proxies into a full nginx
//! configuration, supervises nginx with live reload on definition
//! changes, and warms tile caches ahead of real traffic.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.yaml ──▶ config (load + validate)
//!                        │
//!                        ├──▶ nginx::builder ──▶ nginx.conf ──▶ supervisor
//!                        │         ▲                              │ spawn/SIGHUP
//!                        │    plugins (plain, tiled)              ▼
//!                        │                                   nginx process
//!                        │                                        ▲
//!                        └──▶ seed pipeline ── warming requests ──┘
//! ```
//!
//! Subcommands: `generate` prints the configuration, `serve` runs
//! nginx under supervision, `seed` warms caches through the local
//! instance, `stats` reports per-partition disk usage.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachewarden::config::load_config;
use cachewarden::nginx::builder::{render_nginx_config, CACHE_ROOT};
use cachewarden::plugins::PluginRegistry;
use cachewarden::seed;
use cachewarden::stats;
use cachewarden::supervisor::{Supervisor, NGINX_CONF_PATH};

#[derive(Parser)]
#[command(name = "cachewarden")]
#[command(about = "Declarative nginx cache manager", long_about = None)]
struct Cli {
    /// Path to the proxy definition file.
    #[arg(long, default_value = "/etc/cachewarden/config.yaml")]
    config_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generated nginx configuration
    Generate,
    /// Run nginx under supervision with live reload
    Serve {
        /// Where the generated configuration is written
        #[arg(long, default_value = NGINX_CONF_PATH)]
        output: PathBuf,
    },
    /// Warm proxy caches through the locally running instance
    Seed {
        /// Only seed the proxy with this exact URL
        #[arg(long)]
        proxy_url: Option<String>,

        /// Address of the locally running proxy
        #[arg(long, default_value = "http://localhost:80")]
        target: String,
    },
    /// Report on-disk cache partition sizes
    Stats {
        /// Cache directory root
        #[arg(long, default_value = CACHE_ROOT)]
        cache_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cachewarden=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let registry = PluginRegistry::default();

    match cli.command {
        Commands::Generate => {
            let config = load_config(&cli.config_file)?;
            print!("{}", render_nginx_config(&config, &registry)?);
        }
        Commands::Serve { output } => {
            tracing::info!(
                definitions = %cli.config_file.display(),
                output = %output.display(),
                "Starting supervised nginx"
            );
            let supervisor = Supervisor::new(&cli.config_file, &output, registry);
            supervisor.serve().await?;
        }
        Commands::Seed { proxy_url, target } => {
            let config = load_config(&cli.config_file)?;
            seed::seed_proxies(&config, proxy_url.as_deref(), &target, &registry).await?;
        }
        Commands::Stats { cache_dir } => {
            let config = load_config(&cli.config_file)?;
            let index = stats::fingerprint_index(&config);
            let sizes = stats::partition_sizes(&cache_dir)?;
            print!("{}", stats::render_table(&sizes, &index));
        }
    }
    Ok(())
}
