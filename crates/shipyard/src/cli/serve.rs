//! the `serve` subcommand - runs the callback server.

use std::net::SocketAddr;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use shipyard_types::Config;
use tokio::net::TcpListener;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use super::ConfigArgs;
use super::config::open_database;
use crate::ViewNotifier;

/// run the shipyard callback server
#[derive(Args, Debug, Default)]
pub struct ServeCommand {
    /// config file and connection flags
    #[command(flatten)]
    pub config: ConfigArgs,

    /// address to listen on (e.g., 0.0.0.0:8080)
    #[arg(long, env = "SHIPYARD_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// log level (trace, debug, info, warn, error)
    #[arg(long, env = "SHIPYARD_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl ServeCommand {
    /// resolve config, applying serve-only overrides.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = self.config.load()?;
        if let Some(listen_addr) = &self.listen_addr {
            config.listen_addr = listen_addr.clone();
        }
        Ok(config)
    }

    /// run the serve command
    pub async fn run(self) -> Result<()> {
        let log_level = parse_log_level(self.log_level.as_deref().unwrap_or("info"));
        let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
        tracing::subscriber::set_global_default(subscriber)?;

        info!("Starting shipyard...");

        let config = self.resolve_config()?;
        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .context("invalid listen address")?;

        info!("Database type: {}", config.database.db_type);
        let db = open_database(&config).await?;
        info!("Database initialized successfully");

        if !config.token.is_configured() {
            warn!(
                "No token secret configured (token.secret / SHIPYARD_TOKEN_SECRET); \
                 every build callback will fail with 500"
            );
        }

        let app = crate::create_app(db, &config, ViewNotifier::new());

        info!("Starting HTTP server on {}", addr);
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, app).await.context("server error")?;

        Ok(())
    }
}

fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
