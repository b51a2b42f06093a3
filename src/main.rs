use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use factura::api::server::{ApiState, start_server};
use factura::config::Config;
use factura::db;

#[derive(Parser)]
#[command(name = "factura", version, about = "Small invoice-tracking service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server (default).
    Serve {
        /// Socket address to bind; overrides SERVER_BIND.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Connect to the configured store, apply migrations, and exit.
    Migrate,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("load configuration")?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let database = db::connect_from_config(&config.database)
                .await
                .context("connect to database")?;
            let state = Arc::new(ApiState { db: database });

            let addr = bind.unwrap_or(config.server.bind);
            let bound = start_server(addr, state).await?;
            tracing::info!(
                addr = %bound,
                backend = config.database.backend.as_str(),
                "factura listening"
            );

            tokio::signal::ctrl_c()
                .await
                .context("wait for shutdown signal")?;
            tracing::info!("shutting down");
        }
        Command::Migrate => {
            db::connect_from_config(&config.database)
                .await
                .context("apply migrations")?;
            tracing::info!(
                backend = config.database.backend.as_str(),
                "migrations applied"
            );
        }
    }

    Ok(())
}
