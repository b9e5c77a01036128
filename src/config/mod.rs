//! Benchmark configuration: defaults, optional TOML file, CLI overrides.
mod loader;
mod types;

pub use loader::{load_config, ConfigError, ConfigResult};
pub use types::{
    BaselineSettings, BenchConfig, DispatchSettings, FaultSettings, SweepSettings,
    TransportSettings,
};
