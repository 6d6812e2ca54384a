use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::{fs, num::NonZeroUsize, path::PathBuf, time::Duration};
use tusc::{DEFAULT_CHUNK_SIZE, serde_utils};
use url::Url;

pub const KEYRING_SERVICE: &str = "tusc-token";
pub const KEYRING_USER: &str = "tusc";
pub const ENV_PREFIX: &str = "TUSC_";

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<NonZeroUsize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<NonZeroUsize>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "serde_utils::deserialize_optional_duration",
        serialize_with = "serde_utils::serialize_optional_duration"
    )]
    pub request_timeout: Option<Duration>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "serde_utils::deserialize_optional_duration",
        serialize_with = "serde_utils::serialize_optional_duration"
    )]
    pub transfer_timeout: Option<Duration>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigEnv {
    endpoint: Option<Url>,
    chunk_size: Option<NonZeroUsize>,
    concurrency: Option<NonZeroUsize>,
    #[serde(default, deserialize_with = "serde_utils::deserialize_optional_duration")]
    request_timeout: Option<Duration>,
    #[serde(default, deserialize_with = "serde_utils::deserialize_optional_duration")]
    transfer_timeout: Option<Duration>,
    token: Option<String>,
}

#[derive(Debug)]
pub struct Config {
    pub endpoint: Option<Url>,
    pub chunk_size: NonZeroUsize,
    pub concurrency: Option<NonZeroUsize>,
    pub request_timeout: Option<Duration>,
    pub transfer_timeout: Option<Duration>,
    pub token: Option<String>,
}

fn merge_config(base: ConfigFile, override_config: ConfigEnv) -> Config {
    Config {
        endpoint: override_config.endpoint.or(base.endpoint),
        chunk_size: override_config
            .chunk_size
            .or(base.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE),
        concurrency: override_config.concurrency.or(base.concurrency),
        request_timeout: override_config.request_timeout.or(base.request_timeout),
        transfer_timeout: override_config.transfer_timeout.or(base.transfer_timeout),
        token: override_config.token,
    }
}

fn config_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("io", "tusc", "tusc")
        .ok_or(anyhow!("Unable to determine home directory"))?;
    Ok(project_dirs.config_dir().join("config.toml"))
}

pub fn read_config() -> Result<Config> {
    let _ = dotenv();
    let env_config = envy::prefixed(ENV_PREFIX)
        .from_env::<ConfigEnv>()
        .context("Invalid TUSC_* environment variable")?;

    let file_config = if let Ok(config) = fs::read_to_string(config_path()?) {
        toml::from_str(&config).context("Failed to parse config.toml")?
    } else {
        ConfigFile::default()
    };

    let mut config = merge_config(file_config, env_config);
    if config.token.is_none() {
        config.token = keyring_token();
    }
    Ok(config)
}

/// The keyring is optional: a missing entry or an unavailable secret store
/// both mean "no token".
fn keyring_token() -> Option<String> {
    let secret = Entry::new(KEYRING_SERVICE, KEYRING_USER).and_then(|entry| entry.get_secret());
    match secret {
        Ok(secret) => String::from_utf8(secret).ok(),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            tracing::debug!(error = %e, "OS keyring unavailable");
            None
        }
    }
}

pub fn write_config(config: ConfigFile) -> Result<PathBuf> {
    let path = config_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create config directory")?;
    }
    let content = toml::to_string_pretty(&config)?;
    fs::write(&path, content).context("Failed to write config.toml")?;
    Ok(path)
}

pub fn set_token_keyring(token: String) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
    entry.set_secret(token.as_bytes())?;
    println!("Token stored for use with tusc");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            endpoint: Some(url("https://file.example.com/files/")),
            chunk_size: NonZeroUsize::new(1024),
            concurrency: NonZeroUsize::new(2),
            request_timeout: Some(Duration::from_secs(10)),
            transfer_timeout: None,
        };
        let env = ConfigEnv {
            endpoint: Some(url("https://env.example.com/files/")),
            concurrency: NonZeroUsize::new(8),
            token: Some("secret".to_string()),
            ..Default::default()
        };

        let config = merge_config(file, env);
        assert_eq!(config.endpoint, Some(url("https://env.example.com/files/")));
        assert_eq!(config.chunk_size.get(), 1024);
        assert_eq!(config.concurrency.map(NonZeroUsize::get), Some(8));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.transfer_timeout, None);
        assert_eq!(config.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_defaults() {
        let config = merge_config(ConfigFile::default(), ConfigEnv::default());
        assert!(config.endpoint.is_none());
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.concurrency.is_none());
        assert!(config.token.is_none());
    }

    #[test]
    fn test_config_file_round_trip() {
        let content = r#"
            endpoint = "https://tus.example.com/files/"
            chunk_size = 1048576
            request_timeout = "30s"
        "#;
        let file: ConfigFile = toml::from_str(content).unwrap();
        assert_eq!(file.chunk_size.map(NonZeroUsize::get), Some(1048576));
        assert_eq!(file.request_timeout, Some(Duration::from_secs(30)));
        assert!(file.transfer_timeout.is_none());

        let written = toml::to_string_pretty(&file).unwrap();
        assert!(written.contains(r#"request_timeout = "30s""#));
        assert!(!written.contains("transfer_timeout"));
    }
}
