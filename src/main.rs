use anyhow::Context;
use clap::{Parser, Subcommand};
use muxbench::baseline::HttpBaseline;
use muxbench::config::{load_config, BenchConfig};
use muxbench::dispatcher::RequestDispatcher;
use muxbench::fault::{NetworkFaultController, TcNetem};
use muxbench::metrics::{init_metrics, start_metrics_server};
use muxbench::orchestrator::BenchmarkOrchestrator;
use muxbench::report::BenchReport;
use muxbench::transport::QuicConnector;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "muxbench", version, about = "QUIC multiplexing vs HTTP/1.1 latency benchmark")]
struct Cli {
    /// TOML file; anything it omits keeps its default
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the CSV and JSON output
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    quic_addr: Option<SocketAddr>,

    /// Base URL of the HTTP/1.1 server
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-batch / per-request timeout
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Serve Prometheus metrics on this address while running
    #[arg(long, global = true)]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Paired requests with no fault injection
    Baseline {
        #[arg(long)]
        trials: Option<u32>,
        /// Request path, repeatable
        #[arg(long = "path")]
        paths: Vec<String>,
    },
    /// Repeat the paired requests under each loss level
    LossSweep {
        #[arg(long)]
        trials: Option<u32>,
        /// Comma separated loss percentages
        #[arg(long, value_delimiter = ',')]
        loss: Vec<f32>,
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Interface the netem rule goes on
        #[arg(long)]
        interface: Option<String>,
        /// Run tc directly instead of through sudo
        #[arg(long)]
        no_sudo: bool,
        #[arg(long = "path")]
        paths: Vec<String>,
    },
    /// Many files at once on one connection vs one connection each
    Stress {
        #[arg(long)]
        files: Option<u32>,
    },
    /// Disrupt one large download mid-transfer on each transport
    Migration {
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        threshold: Option<u64>,
        #[arg(long)]
        settle_ms: Option<u64>,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut BenchConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(addr) = self.quic_addr {
            config.transport.quic_addr = addr;
        }
        if let Some(url) = &self.base_url {
            config.baseline.base_url = url.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.dispatch.timeout_ms = ms;
        }

        match &self.command {
            Command::Baseline { trials, paths } => {
                if let Some(trials) = trials {
                    config.sweep.baseline_trials = *trials;
                }
                if !paths.is_empty() {
                    config.sweep.paths = paths.clone();
                }
            }
            Command::LossSweep {
                trials,
                loss,
                delay_ms,
                interface,
                no_sudo,
                paths,
            } => {
                if let Some(trials) = trials {
                    config.sweep.trials = *trials;
                }
                if !loss.is_empty() {
                    config.sweep.loss_levels = loss.clone();
                }
                if let Some(delay) = delay_ms {
                    config.sweep.delay_ms = *delay;
                }
                if let Some(interface) = interface {
                    config.fault.interface = interface.clone();
                }
                if *no_sudo {
                    config.fault.use_sudo = false;
                }
                if !paths.is_empty() {
                    config.sweep.paths = paths.clone();
                }
            }
            Command::Stress { files } => {
                if let Some(files) = files {
                    config.sweep.stress_files = *files;
                }
            }
            Command::Migration {
                path,
                threshold,
                settle_ms,
            } => {
                if let Some(path) = path {
                    config.sweep.migration_path = path.clone();
                }
                if let Some(threshold) = threshold {
                    config.dispatch.migration_threshold = *threshold;
                }
                if let Some(settle) = settle_ms {
                    config.dispatch.settle_delay_ms = *settle;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "muxbench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => BenchConfig::default(),
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.metrics_addr {
        Some(addr) => {
            start_metrics_server(addr).await?;
            tracing::info!(%addr, "Prometheus metrics exporter started");
        }
        None => init_metrics(),
    }

    let connector = QuicConnector::new(config.connection_config());
    let baseline = HttpBaseline::new(
        &config.baseline.base_url,
        config.baseline.accept_invalid_certs,
    )?;
    let dispatcher = RequestDispatcher::new(connector, baseline, config.dispatch_config());
    let faults = NetworkFaultController::new(
        TcNetem::new(config.fault.use_sudo),
        config.fault.interface.clone(),
    );
    let mut orchestrator = BenchmarkOrchestrator::new(dispatcher, faults);

    tracing::info!(
        quic = %config.transport.quic_addr,
        http = %config.baseline.base_url,
        command = ?cli.command,
        "muxbench starting"
    );

    let report = match &cli.command {
        Command::Baseline { .. } => {
            let samples = orchestrator
                .run_baseline(config.sweep.baseline_trials, &config.sweep.paths)
                .await?;
            BenchReport::from_baseline(samples)
        }
        Command::LossSweep { .. } => {
            let sweep_config = config.sweep_config()?;
            let finished = tokio::select! {
                outcome = orchestrator.run_sweep(&sweep_config) => Some(outcome),
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(outcome) = finished else {
                tracing::warn!("interrupted, clearing network condition");
                orchestrator.clear_faults().await?;
                anyhow::bail!("loss sweep interrupted");
            };
            BenchReport::from_sweep(&outcome?)
        }
        Command::Stress { .. } => {
            let stress = orchestrator
                .run_stress(&config.sweep.stress_paths())
                .await?;
            BenchReport::from_stress(stress, orchestrator.ledger().to_vec())
        }
        Command::Migration { .. } => {
            let migration = orchestrator
                .run_migration(&config.sweep.migration_path)
                .await?;
            BenchReport::from_migration(migration)
        }
    };

    println!("{}", report.summary_table());
    let paths = report.save(&config.output_dir)?;
    if let Some(csv) = &paths.trials_csv {
        println!("Samples saved to {}", csv.display());
    }
    if let Some(csv) = &paths.conditions_csv {
        println!("Per-condition means saved to {}", csv.display());
    }
    println!("Report saved to {}", paths.json.display());

    Ok(())
}
