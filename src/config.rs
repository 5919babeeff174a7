use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from bench.toml.
///
/// The five benchmark keys are required; `[runner]` falls back to invoking
/// `ollama run {model} {prompt} --verbose` with a 10 minute timeout.
#[derive(Debug, Deserialize)]
pub struct BenchConfig {
    pub models_to_test: Vec<String>,
    pub power_modes: Vec<String>,
    pub swap_configurations: Vec<String>,
    pub prompt: String,
    pub output_csv_file: PathBuf,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub command: String,
    /// Argument template; `{model}` and `{prompt}` are substituted per run.
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: "ollama".to_string(),
            args: vec![
                "run".to_string(),
                "{model}".to_string(),
                "{prompt}".to_string(),
                "--verbose".to_string(),
            ],
            timeout_secs: 600,
        }
    }
}

/// Errors that can occur while loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file is missing or unreadable.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not a valid config document.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl BenchConfig {
    /// Load and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: BenchConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(
            path = %path.display(),
            models = config.models_to_test.len(),
            power_modes = config.power_modes.len(),
            swap_configurations = config.swap_configurations.len(),
            "config loaded"
        );
        Ok(config)
    }
}
