use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub username: String,
    pub reconnect_interval_ms: u64,
    pub typing_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8080/ws".to_string(),
            username: String::new(),
            reconnect_interval_ms: 3000,
            typing_timeout_ms: 3000,
        }
    }
}

impl Config {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }

    /// Reads the config at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Config> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            info!("Created default config at {}", path.display());
            return Ok(config);
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(path, toml::to_string(self)?)
            .with_context(|| format!("writing {}", path.display()))
    }
}

/// `$HOME/.config/wschat`
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(Path::new(&home).join(".config").join("wschat"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_file_on_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_or_create(&path).unwrap(), config);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "username = \"alice\"\n").unwrap();

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config.username, "alice");
        assert_eq!(config.server_url, "ws://localhost:8080/ws");
        assert_eq!(config.reconnect_interval(), Duration::from_millis(3000));
        assert_eq!(config.typing_timeout(), Duration::from_millis(3000));
    }

    #[test]
    fn saved_username_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::load_or_create(&path).unwrap();
        config.username = "bob".into();
        config.save(&path).unwrap();

        assert_eq!(Config::load_or_create(&path).unwrap().username, "bob");
    }

    #[test]
    fn rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "server_url = [").unwrap();
        assert!(Config::load_or_create(&path).is_err());
    }
}
