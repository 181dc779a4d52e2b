//! Configuration file support.
//!
//! An optional TOML file sets the prompt, the echo default, `PATHEXT` and the
//! execution limits:
//!
//! ```toml
//! prompt = "$P$G"
//! echo = true
//! pathext = ".COM;.EXE;.BAT;.CMD"
//!
//! [limits]
//! max_call_depth = 256
//! max_iterations = 1000000
//! max_command_count = 10000000
//! pipe_buffer = 16
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::interpreter::command_resolution::DEFAULT_PATHEXT;
use crate::interpreter::expansion::prompt::DEFAULT_PROMPT;
use crate::interpreter::ExecutionLimits;
use crate::shell::ShellOptions;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "JUST_CMD_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_call_depth: usize,
    pub max_iterations: u64,
    pub max_command_count: u64,
    pub pipe_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = ExecutionLimits::default();
        Self {
            max_call_depth: limits.max_call_depth,
            max_iterations: limits.max_iterations,
            max_command_count: limits.max_command_count,
            pipe_buffer: limits.pipe_buffer,
        }
    }
}

impl From<LimitsConfig> for ExecutionLimits {
    fn from(config: LimitsConfig) -> Self {
        Self {
            max_call_depth: config.max_call_depth,
            max_iterations: config.max_iterations,
            max_command_count: config.max_command_count,
            pipe_buffer: config.pipe_buffer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    pub prompt: String,
    pub echo: bool,
    pub pathext: String,
    pub limits: LimitsConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            echo: true,
            pathext: DEFAULT_PATHEXT.to_string(),
            limits: LimitsConfig::default(),
        }
    }
}

impl ShellConfig {
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &text)
    }

    /// Load from `explicit`, else from `$JUST_CMD_CONFIG`, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
        match path {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Shell options carrying this configuration.
    pub fn into_options(self) -> ShellOptions {
        ShellOptions {
            limits: Some(self.limits.into()),
            echo: Some(self.echo),
            prompt: Some(self.prompt),
            pathext: Some(self.pathext),
            ..ShellOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_execution_limits() {
        let config = ShellConfig::default();
        assert_eq!(config.prompt, "$P$G");
        assert!(config.echo);
        assert_eq!(ExecutionLimits::from(config.limits), ExecutionLimits::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ShellConfig::from_toml(
            Path::new("cfg.toml"),
            "echo = false\n[limits]\nmax_call_depth = 8\n",
        )
        .unwrap();
        assert!(!config.echo);
        assert_eq!(config.pathext, ".COM;.EXE;.BAT;.CMD");
        assert_eq!(config.limits.max_call_depth, 8);
        assert_eq!(config.limits.max_iterations, 1_000_000);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = ShellConfig::from_toml(Path::new("cfg.toml"), "colour = \"blue\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        let err = ShellConfig::from_toml(Path::new("cfg.toml"), "[limits]\nmax_depth = 3\n").unwrap_err();
        assert!(err.to_string().starts_with("invalid config file cfg.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prompt = \"$G \"").unwrap();
        let config = ShellConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.prompt, "$G ");

        let options = config.into_options();
        assert_eq!(options.prompt.as_deref(), Some("$G "));
        assert_eq!(options.echo, Some(true));
        assert!(options.runner.is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = ShellConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
