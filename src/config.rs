use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::engine::resolve_engine_path;
use crate::error::{BrokerError, Result};

fn default_path_env_indirection() -> String {
    "MEDIABROKER_FFMPEG_PATH_ENV_VARIABLE".to_string()
}

fn default_path_env() -> String {
    "MEDIABROKER_FFMPEG_PATH".to_string()
}

fn default_log_window_bytes() -> usize {
    8 * 1024
}

fn default_max_depth() -> usize {
    4
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the transcoding engine binary. Empty means "look it up"
    #[serde(default)]
    pub binary_path: String,
    /// Variable whose value is the *name* of another variable holding the path
    #[serde(default = "default_path_env_indirection")]
    pub path_env_indirection: String,
    /// Variable holding the engine path directly
    #[serde(default = "default_path_env")]
    pub path_env: String,
    /// How much of the engine's diagnostic output is kept for logging
    #[serde(default = "default_log_window_bytes")]
    pub log_window_bytes: usize,
    /// Directory for temporary engine output. Defaults to the system temp dir
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Longest converter chain the resolver will consider
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: String::new(),
            path_env_indirection: default_path_env_indirection(),
            path_env: default_path_env(),
            log_window_bytes: default_log_window_bytes(),
            temp_dir: None,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl EngineConfig {
    /// Fill in `binary_path` from the environment when it was not configured.
    pub fn resolve(&mut self) {
        if self.binary_path.is_empty() {
            let path = resolve_engine_path(
                &self.path_env_indirection,
                &self.path_env,
                |name| std::env::var(name).ok(),
            );
            self.binary_path = path.to_string_lossy().into_owned();
            info!("Resolved transcoding engine path: {}", self.binary_path);
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BrokerError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| BrokerError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BrokerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| BrokerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolver.max_depth == 0 {
            return Err(BrokerError::Config(
                "resolver.max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[resolver]\nmax_depth = 2\n").unwrap();
        assert_eq!(config.resolver.max_depth, 2);
        assert_eq!(config.engine.log_window_bytes, 8 * 1024);
        assert!(config.engine.binary_path.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediabroker.toml");

        let mut config = Config::default();
        config.engine.binary_path = "/opt/ffmpeg/bin/ffmpeg".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.engine.binary_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(loaded.resolver.max_depth, 4);
    }

    #[test]
    fn test_zero_depth_is_invalid() {
        let mut config = Config::default();
        config.resolver.max_depth = 0;
        assert!(config.validate().is_err());
    }
}
