//! configuration loading shared by every subcommand.

use std::path::{Path, PathBuf};

use clap::Args;
use color_eyre::eyre::{Context, Result, bail};
use secrecy::SecretString;
use shipyard_db::ShipyardDb;
use shipyard_types::{Config, DatabaseConfig};
use tracing::{debug, info};

/// default config file search paths (in order of priority).
const CONFIG_SEARCH_PATHS: &[&str] = &["/etc/shipyard/config.toml", "./config.toml"];

/// `(legacy, current)` environment variable pairs.
///
/// deployments that predate shipyard set the unprefixed names.
const LEGACY_ENV_VARS: &[(&str, &str)] = &[
    ("JWT_SECRET", "SHIPYARD_TOKEN_SECRET"),
    ("DATABASE_URL", "SHIPYARD_DATABASE_URL"),
];

/// copy legacy env vars onto their `SHIPYARD_*` names when those are unset.
///
/// call this before clap parses arguments.
pub fn apply_legacy_env_fallback() {
    apply_env_fallback(LEGACY_ENV_VARS);
}

fn apply_env_fallback(pairs: &[(&str, &str)]) {
    use std::env;

    for (legacy_key, current_key) in pairs {
        if env::var_os(current_key).is_some() {
            continue;
        }
        if let Ok(value) = env::var(legacy_key) {
            debug!("Using {} for {}", legacy_key, current_key);
            // SAFETY: called during CLI initialization, before the server
            // spawns any tasks that read the environment.
            unsafe {
                env::set_var(current_key, value);
            }
        }
    }
}

/// config file and connection flags shared by all subcommands
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// path to config file (toml format)
    #[arg(short, long, env = "SHIPYARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// database url (sqlite:///path or postgres://...)
    #[arg(long, env = "SHIPYARD_DATABASE_URL")]
    pub database_url: Option<String>,

    /// machine callback token signing secret
    #[arg(long, env = "SHIPYARD_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,
}

impl ConfigArgs {
    /// find and load a config file, returning none if there is none.
    fn load_config_file(config_path: Option<&PathBuf>) -> Result<Option<Config>> {
        // an explicit path must exist
        if let Some(path) = config_path {
            return read_config(path).map(Some);
        }

        for path_str in CONFIG_SEARCH_PATHS {
            let path = Path::new(path_str);
            if path.exists() {
                debug!("Found config file at {:?}", path);
                return read_config(path).map(Some);
            }
        }

        Ok(None)
    }

    /// resolve the effective configuration.
    ///
    /// priority order: defaults -> config file -> flags/env
    pub fn load(&self) -> Result<Config> {
        let mut config = match Self::load_config_file(self.config.as_ref())? {
            Some(file_config) => {
                info!("Loaded configuration from file");
                file_config
            }
            None => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        };

        if let Some(db_url) = &self.database_url {
            let write_ahead_log = config.database.sqlite.write_ahead_log;
            config.database = parse_database_url(db_url)?;
            config.database.sqlite.write_ahead_log = write_ahead_log;
        }
        if let Some(secret) = &self.token_secret {
            config.token.secret = Some(SecretString::from(secret.as_str()));
        }

        Ok(config)
    }

    /// load configuration and open the database.
    pub async fn connect(&self) -> Result<(Config, ShipyardDb)> {
        let config = self.load()?;
        let db = open_database(&config).await?;
        Ok((config, db))
    }
}

/// open (and migrate) the configured database.
pub async fn open_database(config: &Config) -> Result<ShipyardDb> {
    if config.database.db_type == "sqlite" {
        let db_path = Path::new(&config.database.connection_string);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!("Creating database directory: {:?}", parent);
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory: {:?}", parent)
                })?;
            }
        }
    }

    ShipyardDb::new(config)
        .await
        .context("failed to initialize database")
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config file: {:?}", path))
}

/// parse a database url into a [`DatabaseConfig`].
pub(crate) fn parse_database_url(db_url: &str) -> Result<DatabaseConfig> {
    let parsed =
        url::Url::parse(db_url).with_context(|| format!("invalid database URL: {}", db_url))?;

    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(DatabaseConfig {
            db_type: "postgres".to_string(),
            connection_string: db_url.to_string(),
            ..Default::default()
        }),
        "sqlite" => Ok(DatabaseConfig {
            db_type: "sqlite".to_string(),
            connection_string: parsed.path().to_string(),
            ..Default::default()
        }),
        scheme => bail!(
            "unsupported database scheme '{}', expected 'sqlite' or 'postgres'",
            scheme
        ),
    }
}
