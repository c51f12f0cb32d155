//! Service entry point.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use promptmeter::config::Config;
use promptmeter::registry::TemplateRegistry;
use promptmeter::server::{AppState, EstimatorServer, routes};
use promptmeter::tokens::TokenCounter;

#[derive(Parser, Debug)]
#[command(
    name = "promptmeter",
    version,
    about = "Token and cost estimation for workflow prompt templates"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP estimation service
    Serve {
        /// Bind address (overrides HOST)
        #[arg(long)]
        host: Option<std::net::IpAddr>,
        /// Port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List all registered template keys
    Keys,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(host, port).await,
        Command::Keys => list_keys(),
    }
}

async fn serve(host: Option<std::net::IpAddr>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let registry = TemplateRegistry::builtin()?;
    tracing::info!("loaded {} prompt templates", registry.len());

    let counter = TokenCounter::new()?;

    let state = Arc::new(AppState {
        registry,
        counter,
        webhook_secret: config
            .webhook_secret
            .as_ref()
            .map(|s| s.expose_secret().to_string()),
    });

    let mut server = EstimatorServer::new(&config);
    server.start(routes(state)).await?;

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}

fn list_keys() -> anyhow::Result<()> {
    let registry = TemplateRegistry::builtin()?;
    for key in registry.keys() {
        println!("{key}");
    }
    Ok(())
}
