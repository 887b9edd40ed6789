use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use liveboard::config::RelayConfig;
use liveboard::relay::server::{self, ServerConfig};
use liveboard::viewer::client;

#[derive(Parser)]
#[command(name = "liveboard")]
#[command(version, about = "Relays GitLab issue webhooks to live viewers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Allow cross-origin requests (local UI development)
        #[arg(long)]
        dev: bool,
    },
    /// Follow the live board from a running relay
    Watch {
        /// Base URL of the relay server
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("liveboard=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port, dev } => {
            let config = RelayConfig::from_env()?;
            server::start_server(
                config,
                ServerConfig {
                    port,
                    dev_mode: dev,
                },
            )
            .await
        }
        Commands::Watch { server } => client::run(&server).await,
    }
}
