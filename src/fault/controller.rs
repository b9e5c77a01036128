use crate::fault::error::{FaultError, FaultResult};
use crate::fault::types::NetworkCondition;
use async_trait::async_trait;

/// Runs one `tc` invocation to completion.
#[async_trait]
pub trait FaultExecutor: Send + Sync {
    async fn execute(&self, args: &[String]) -> FaultResult<()>;
}

/// Runs `tc` as a child process, through `sudo` unless told otherwise.
#[derive(Debug, Clone)]
pub struct TcNetem {
    use_sudo: bool,
}

impl TcNetem {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }
}

impl Default for TcNetem {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl FaultExecutor for TcNetem {
    async fn execute(&self, args: &[String]) -> FaultResult<()> {
        let mut command = if self.use_sudo {
            let mut c = tokio::process::Command::new("sudo");
            c.arg("-n").arg("tc");
            c
        } else {
            tokio::process::Command::new("tc")
        };
        command.args(args);

        let rendered = format!("tc {}", args.join(" "));
        let output = command.output().await.map_err(|e| FaultError::CommandFailed {
            command: rendered.clone(),
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(FaultError::CommandFailed {
                command: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// `tc qdisc del dev <iface> root`
pub fn clear_args(interface: &str) -> Vec<String> {
    ["qdisc", "del", "dev", interface, "root"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `tc qdisc add dev <iface> root netem [delay Nms] [loss P%]`
pub fn netem_args(interface: &str, condition: &NetworkCondition) -> Vec<String> {
    let mut args: Vec<String> = ["qdisc", "add", "dev", interface, "root", "netem"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    if !condition.delay.is_zero() {
        args.push("delay".into());
        args.push(format!("{}ms", condition.delay_ms()));
    }
    if condition.loss_percent > 0.0 {
        args.push("loss".into());
        args.push(format!("{}%", condition.loss_percent));
    }
    args
}

/// Sole writer of the emulated network condition on one interface.
pub struct NetworkFaultController<E> {
    executor: E,
    interface: String,
    active: NetworkCondition,
}

impl<E: FaultExecutor> NetworkFaultController<E> {
    pub fn new(executor: E, interface: impl Into<String>) -> Self {
        Self {
            executor,
            interface: interface.into(),
            active: NetworkCondition::clear(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// The condition believed to be installed.
    pub fn active(&self) -> NetworkCondition {
        self.active
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Remove whatever rule is installed, then install `condition` unless it
    /// is clear. Returns once the commands have finished.
    ///
    /// If a rule is known to be installed and cannot be removed, the error is
    /// returned and `active` still reports that rule.
    pub async fn apply(&mut self, condition: NetworkCondition) -> FaultResult<()> {
        if let Err(e) = self.executor.execute(&clear_args(&self.interface)).await {
            if !self.active.is_clear() {
                tracing::error!(
                    interface = %self.interface,
                    active = %self.active,
                    error = %e,
                    "could not remove network condition"
                );
                return Err(e);
            }
            // Deleting when nothing is installed fails; that is the normal case.
            tracing::debug!(interface = %self.interface, error = %e, "no qdisc removed");
        }
        self.active = NetworkCondition::clear();
        crate::metrics::set_network_condition(0.0, 0);

        if condition.is_clear() {
            tracing::info!(interface = %self.interface, "network path clear");
            return Ok(());
        }

        self.executor
            .execute(&netem_args(&self.interface, &condition))
            .await
            .map_err(|e| FaultError::FaultInjectionUnavailable(e.to_string()))?;

        self.active = condition;
        crate::metrics::set_network_condition(condition.loss_percent, condition.delay_ms());
        tracing::info!(interface = %self.interface, %condition, "network condition applied");
        Ok(())
    }

    pub async fn clear(&mut self) -> FaultResult<()> {
        self.apply(NetworkCondition::clear()).await
    }
}
