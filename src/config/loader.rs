use std::{borrow::Cow, path::Path};

use config::{Config, File, FileFormat};
use thiserror::Error;

use crate::{config::models::GatewayConfig, core::template};

/// Errors raised while loading the configuration file. All of them are fatal.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to find config-file '{path}': {source}")]
    NotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config-file '{path}' is a directory")]
    IsDirectory { path: String },

    #[error("failed to read config-file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config-file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("invalid listen port {0}: must be between 1 and 65535")]
    InvalidListen(u16),
}

/// Load configuration from a YAML file.
///
/// Environment variables referenced as `${VAR}` are substituted into the raw
/// file content before parsing; see [`expand_env`].
pub async fn load_config(config_path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    let config_path = config_path.as_ref();
    let display = config_path.display().to_string();

    let meta = tokio::fs::metadata(config_path)
        .await
        .map_err(|source| ConfigError::NotFound {
            path: display.clone(),
            source,
        })?;
    if meta.is_dir() {
        return Err(ConfigError::IsDirectory { path: display });
    }

    let raw = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

    parse_config(&raw).map_err(|e| match e {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: display,
            source,
        },
        other => other,
    })
}

/// Parse configuration from raw YAML text after environment substitution.
pub fn parse_config(raw: &str) -> Result<GatewayConfig, ConfigError> {
    let content = expand_env(raw);

    let settings = Config::builder()
        .add_source(File::from_str(&content, FileFormat::Yaml))
        .build()
        .map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;

    let gateway_config: GatewayConfig =
        settings
            .try_deserialize()
            .map_err(|source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;

    if gateway_config.listen == 0 {
        return Err(ConfigError::InvalidListen(gateway_config.listen));
    }

    Ok(gateway_config)
}

/// Substitute `${VAR}` with the value of environment variable `VAR`.
///
/// Unset variables are left in place, which keeps request-time templates such
/// as `/api/${id}` intact. Write `$${VAR}` to keep a placeholder even when an
/// environment variable of that name exists.
pub fn expand_env(raw: &str) -> Cow<'_, str> {
    template::expand_lenient(raw, |key| std::env::var(key).ok())
}
