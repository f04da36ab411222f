use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    /// `None` when running on defaults.
    pub path: Option<PathBuf>,
}

/// Resolves and loads the configuration file, then applies environment
/// overrides.
///
/// Priority: `--config` > ./config/webpilot.yaml > <config dir>/webpilot/config.yaml.
/// An explicit `--config` must exist; the implicit locations are optional.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = match config_path {
        Some(path) => Some(path.clone()),
        None => default_config_path(),
    };

    let mut config = match &path {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = Config::from_yaml_str(&content, path)?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => {
            debug!("No config file found, using defaults");
            Config::default()
        }
    };

    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    config.validate()?;
    Ok(LoadedConfig { config, path })
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("config/webpilot.yaml");
    if local.exists() {
        return Some(local);
    }
    let mut path = dirs::config_dir()?;
    path.push("webpilot");
    path.push("config.yaml");
    path.exists().then_some(path)
}
