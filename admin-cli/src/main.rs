mod commands;

use clap::{Parser, Subcommand};
use proxygate::config::{StoreBackend, StoreConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "proxygate-admin")]
#[command(about = "Offline admin tools for the ProxyGate credential store")]
struct Cli {
    /// Use this JSON store file instead of the configured store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how many secrets were issued and the most recent ones
    Stats {
        #[arg(long, default_value_t = 5)]
        recent: usize,
    },
    /// Write the MTProxy per-user secret table
    ExportUsers {
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check whether an identity holds a secret
    Lookup { identity: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so exports on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proxygate=warn,proxygate_admin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let store_config = match cli.store {
        Some(path) => StoreConfig {
            backend: StoreBackend::File,
            path,
            ..StoreConfig::default()
        },
        None => StoreConfig::load()?,
    };
    let store = proxygate::store::open_read_only(&store_config).await?;

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Stats { recent } => commands::stats(store, recent, &mut stdout).await,
        Commands::ExportUsers { output } => match output {
            Some(path) => commands::export_users_to_file(store.as_ref(), &path).await,
            None => commands::export_users(store.as_ref(), &mut stdout).await,
        },
        Commands::Lookup { identity } => {
            commands::lookup(store.as_ref(), &identity.into(), &mut stdout).await
        }
    }
}
