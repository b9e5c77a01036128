use crate::config::types::BenchConfig;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read a TOML file; keys it leaves out keep their defaults.
pub fn load_config(path: &Path) -> ConfigResult<BenchConfig> {
    let content = fs::read_to_string(path)?;
    let config: BenchConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
