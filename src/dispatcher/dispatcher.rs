use crate::baseline::BaselineClient;
use crate::correlator::StreamCorrelator;
use crate::dispatcher::error::{DispatchError, DispatchResult};
use crate::dispatcher::session::ConnectionSession;
use crate::dispatcher::types::{DispatchConfig, MigrationOutcome};
use crate::migration::MigrationTrigger;
use crate::stats::TrialResult;
use crate::transport::{
    request_headers, MultiplexedConnection, MultiplexedConnector, StreamId, TransportError,
    TransportResult,
};
use bytes::Bytes;
use tokio::time::{timeout_at, Instant};

/// Issues batches of requests over the multiplexed transport and the baseline.
pub struct RequestDispatcher<C, B> {
    connector: C,
    baseline: B,
    config: DispatchConfig,
}

impl<C, B> RequestDispatcher<C, B>
where
    C: MultiplexedConnector,
    B: BaselineClient,
{
    pub fn new(connector: C, baseline: B, config: DispatchConfig) -> Self {
        Self {
            connector,
            baseline,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn baseline(&self) -> &B {
        &self.baseline
    }

    /// Open one connection and put every request on it, in input order,
    /// before reading any response. The whole send phase is bounded by the
    /// batch timeout.
    pub async fn dispatch_multiplexed(
        &self,
        paths: &[String],
    ) -> DispatchResult<ConnectionSession<C::Connection>> {
        self.dispatch_until(paths, Instant::now() + self.config.timeout)
            .await
    }

    /// Only a failure to establish the connection is an error. A request
    /// that cannot be sent is recorded as failed and the rest still go out.
    async fn dispatch_until(
        &self,
        paths: &[String],
        deadline: Instant,
    ) -> DispatchResult<ConnectionSession<C::Connection>> {
        let mut connection = timeout_at(deadline, self.connector.open_connection())
            .await
            .map_err(|_| TransportError::ConnectionFailed("timed out connecting".into()))??;
        let mut correlator = StreamCorrelator::new();

        for path in paths {
            if Instant::now() >= deadline {
                tracing::warn!(path = %path, "batch deadline passed before request was sent");
                correlator.register_unsent(path.as_str());
                continue;
            }

            let stream_id = match timeout_at(deadline, connection.open_stream()).await {
                Ok(Ok(stream_id)) => stream_id,
                Ok(Err(e)) => {
                    tracing::warn!(path = %path, error = %e, "could not open stream");
                    correlator.register_unsent(path.as_str());
                    continue;
                }
                Err(_) => {
                    tracing::warn!(path = %path, "timed out opening stream");
                    correlator.register_unsent(path.as_str());
                    continue;
                }
            };

            if let Err(e) = correlator.register(stream_id, path.as_str()) {
                tracing::warn!(path = %path, error = %e, "stream id reused by transport");
                correlator.register_unsent(path.as_str());
                continue;
            }

            let sent = timeout_at(
                deadline,
                self.send_request(&mut connection, stream_id, path),
            )
            .await
            .unwrap_or_else(|_| Err(TransportError::SendFailed("timed out".into())));
            if let Err(e) = sent {
                tracing::warn!(%stream_id, path = %path, error = %e, "request not sent");
                // Registered just above, so the stream is known
                let _ = correlator.on_reset(stream_id);
            }
        }

        tracing::debug!(
            streams = correlator.registered(),
            pending = correlator.pending(),
            "multiplexed requests sent"
        );
        Ok(ConnectionSession::new(connection, correlator))
    }

    async fn send_request(
        &self,
        connection: &mut C::Connection,
        stream_id: StreamId,
        path: &str,
    ) -> TransportResult<()> {
        connection
            .send_headers(stream_id, request_headers(&self.config.authority, path))
            .await?;
        connection.send_data(stream_id, Bytes::new(), true).await
    }

    /// Dispatch and wait for one multiplexed batch; sending and waiting
    /// share a single deadline.
    pub async fn run_multiplexed(
        &self,
        paths: &[String],
        trial_index: u32,
    ) -> DispatchResult<Vec<TrialResult>> {
        let deadline = Instant::now() + self.config.timeout;
        let session = self.dispatch_until(paths, deadline).await?;
        Ok(session.wait_until(deadline, trial_index).await.results)
    }

    /// Fetch each path in turn, each on its own connection.
    pub async fn dispatch_baseline(
        &self,
        paths: &[String],
        trial_index: u32,
    ) -> DispatchResult<Vec<TrialResult>> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let fetch = self.baseline.get(path, self.config.timeout).await?;
            tracing::debug!(path = %path, bytes = fetch.bytes, "baseline fetch done");
            results.push(fetch.into_trial(trial_index, path));
        }

        crate::metrics::record_trials(&results);
        Ok(results)
    }

    /// One multiplexed download whose connection changes path once it has
    /// carried more than the migration threshold.
    pub async fn dispatch_migration(
        &self,
        path: &str,
        trial_index: u32,
    ) -> DispatchResult<MigrationOutcome> {
        let deadline = Instant::now() + self.config.timeout;
        let mut session = self.dispatch_until(&[path.to_string()], deadline).await?;
        // No stream means the request never went out; there is nothing to arm.
        let first_stream = session.correlator().stream_ids().next();
        if let Some(stream_id) = first_stream {
            session.arm(MigrationTrigger::new(
                stream_id,
                self.config.migration_threshold,
            ));
        }

        let finished = session.wait_until(deadline, trial_index).await;
        let result = finished
            .results
            .into_iter()
            .next()
            .ok_or(DispatchError::EmptyBatch)?;

        Ok(MigrationOutcome {
            result,
            threshold: self.config.migration_threshold,
            fired_at_bytes: finished.trigger.as_ref().and_then(|t| t.fired_at_bytes()),
            disruption_succeeded: finished.trigger.as_ref().and_then(|t| t.succeeded()),
            reconnects: 0,
        })
    }

    /// One baseline download whose connection is killed past the migration
    /// threshold and resumed on a fresh one.
    pub async fn dispatch_baseline_disrupted(
        &self,
        path: &str,
        trial_index: u32,
    ) -> DispatchResult<MigrationOutcome> {
        let fetch = self
            .baseline
            .get_disrupted(
                path,
                self.config.timeout,
                self.config.migration_threshold,
                self.config.settle_delay,
            )
            .await?;

        let fired_at_bytes = fetch.disrupted_at;
        let reconnects = fetch.reconnects;
        let result = fetch.into_trial(trial_index, path);
        crate::metrics::record_trial(&result);

        Ok(MigrationOutcome {
            result,
            threshold: self.config.migration_threshold,
            fired_at_bytes,
            disruption_succeeded: fired_at_bytes.map(|_| true),
            reconnects,
        })
    }
}

