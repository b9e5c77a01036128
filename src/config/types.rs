use crate::config::loader::{ConfigError, ConfigResult};
use crate::dispatcher::DispatchConfig;
use crate::fault::NetworkCondition;
use crate::orchestrator::SweepConfig;
use crate::transport::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub transport: TransportSettings,
    pub baseline: BaselineSettings,
    pub fault: FaultSettings,
    pub dispatch: DispatchSettings,
    pub sweep: SweepSettings,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// QUIC server the multiplexed side talks to.
    pub quic_addr: SocketAddr,
    pub server_name: String,
    pub bind_addr: SocketAddr,
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineSettings {
    pub base_url: String,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultSettings {
    pub interface: String,
    pub use_sudo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub migration_threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub trials: u32,
    pub loss_levels: Vec<f32>,
    pub delay_ms: u64,
    pub paths: Vec<String>,
    /// Rounds for the no-fault comparison.
    pub baseline_trials: u32,
    pub stress_files: u32,
    pub migration_path: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            baseline: BaselineSettings::default(),
            fault: FaultSettings::default(),
            dispatch: DispatchSettings::default(),
            sweep: SweepSettings::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        Self {
            quic_addr: connection.remote_addr,
            server_name: connection.server_name,
            bind_addr: connection.bind_addr,
            insecure_skip_verify: connection.insecure_skip_verify,
        }
    }
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8443".to_string(),
            accept_invalid_certs: true,
        }
    }
}

impl Default for FaultSettings {
    fn default() -> Self {
        Self {
            interface: "lo".to_string(),
            use_sudo: true,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            timeout_ms: dispatch.timeout.as_millis() as u64,
            settle_delay_ms: dispatch.settle_delay.as_millis() as u64,
            migration_threshold: dispatch.migration_threshold,
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            trials: 5,
            loss_levels: vec![0.0, 1.0, 5.0, 10.0],
            delay_ms: 50,
            paths: vec!["/index.html".to_string()],
            baseline_trials: 10,
            stress_files: 50,
            migration_path: "/bigfile.bin".to_string(),
        }
    }
}

impl SweepSettings {
    /// `/files/file1.bin` .. `/files/fileN.bin`
    pub fn stress_paths(&self) -> Vec<String> {
        (1..=self.stress_files)
            .map(|i| format!("/files/file{i}.bin"))
            .collect()
    }
}

impl BenchConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sweep.trials == 0 || self.sweep.baseline_trials == 0 {
            return Err(ConfigError::Invalid("trial counts must be at least 1".into()));
        }
        if self.sweep.paths.is_empty() {
            return Err(ConfigError::Invalid("sweep.paths is empty".into()));
        }
        if self.dispatch.timeout_ms == 0 {
            return Err(ConfigError::Invalid("dispatch.timeout_ms must be positive".into()));
        }
        if let Some(bad) = self
            .sweep
            .loss_levels
            .iter()
            .find(|l| !(0.0..=100.0).contains(*l))
        {
            return Err(ConfigError::Invalid(format!(
                "loss level {bad} outside 0..=100"
            )));
        }
        Ok(())
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            bind_addr: self.transport.bind_addr,
            remote_addr: self.transport.quic_addr,
            server_name: self.transport.server_name.clone(),
            insecure_skip_verify: self.transport.insecure_skip_verify,
            ..ConnectionConfig::default()
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            timeout: Duration::from_millis(self.dispatch.timeout_ms),
            settle_delay: Duration::from_millis(self.dispatch.settle_delay_ms),
            migration_threshold: self.dispatch.migration_threshold,
            authority: self.transport.server_name.clone(),
        }
    }

    pub fn sweep_config(&self) -> ConfigResult<SweepConfig> {
        let conditions = NetworkCondition::sweep(
            &self.sweep.loss_levels,
            Duration::from_millis(self.sweep.delay_ms),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(SweepConfig {
            conditions,
            trials: self.sweep.trials,
            paths: self.sweep.paths.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport.quic_addr.port(), 4433);
        assert_eq!(config.fault.interface, "lo");

        let dispatch = config.dispatch_config();
        assert_eq!(dispatch.timeout, Duration::from_secs(10));
        assert_eq!(dispatch.settle_delay, Duration::from_secs(1));
        assert_eq!(dispatch.migration_threshold, 2_000_000);

        let sweep = config.sweep_config().unwrap();
        assert_eq!(sweep.conditions.len(), 4);
        assert!(sweep.conditions[0].loss_percent == 0.0);
        assert_eq!(sweep.conditions[3].delay_ms(), 50);
    }

    #[test]
    fn test_stress_paths() {
        let settings = SweepSettings {
            stress_files: 3,
            ..Default::default()
        };
        assert_eq!(
            settings.stress_paths(),
            vec!["/files/file1.bin", "/files/file2.bin", "/files/file3.bin"]
        );
    }

    #[test]
    fn test_empty_paths_rejected() {
        let mut config = BenchConfig::default();
        config.sweep.paths.clear();
        assert!(config.validate().is_err());
    }
}
