use crate::correlator::{CorrelatorError, DataOutcome, StreamCorrelator};
use crate::dispatcher::types::SessionResults;
use crate::migration::{MigrationTrigger, PathMigration};
use crate::stats::Protocol;
use crate::transport::{status_of, MultiplexedConnection, TransportEvent};
use std::time::{Duration, Instant};
use tokio::time::timeout_at;

/// One multiplexed connection and the requests in flight on it.
pub struct ConnectionSession<T: MultiplexedConnection> {
    connection: T,
    correlator: StreamCorrelator,
    trigger: Option<MigrationTrigger>,
    started: Instant,
}

impl<T: MultiplexedConnection> ConnectionSession<T> {
    pub(crate) fn new(connection: T, correlator: StreamCorrelator) -> Self {
        Self {
            connection,
            correlator,
            trigger: None,
            started: Instant::now(),
        }
    }

    pub fn correlator(&self) -> &StreamCorrelator {
        &self.correlator
    }

    pub fn pending(&self) -> usize {
        self.correlator.pending()
    }

    pub fn arm(&mut self, trigger: MigrationTrigger) {
        self.trigger = Some(trigger);
    }

    pub fn trigger(&self) -> Option<&MigrationTrigger> {
        self.trigger.as_ref()
    }

    /// Drive the event loop until every stream has ended or `timeout` has
    /// elapsed, then close the connection. Streams still open at that point
    /// come back as timeout rows.
    pub async fn wait(self, timeout: Duration, trial_index: u32) -> SessionResults {
        self.wait_until(tokio::time::Instant::now() + timeout, trial_index)
            .await
    }

    /// As [`wait`](Self::wait), against an absolute deadline.
    pub async fn wait_until(
        mut self,
        deadline: tokio::time::Instant,
        trial_index: u32,
    ) -> SessionResults {
        let mut timed_out = false;

        while !self.correlator.all_complete() {
            match timeout_at(deadline, self.connection.next_event()).await {
                Ok(Some(event)) => self.handle_event(event),
                Ok(None) => {
                    tracing::warn!(
                        pending = self.correlator.pending(),
                        "connection ended with streams open"
                    );
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        pending = self.correlator.pending(),
                        elapsed_ms = self.started.elapsed().as_millis() as u64,
                        "batch timed out"
                    );
                    timed_out = true;
                    break;
                }
            }
        }

        self.connection.close();
        tracing::debug!(
            streams = self.correlator.registered(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "session closed"
        );

        let results = self
            .correlator
            .into_results(Protocol::Multiplexed, trial_index);
        crate::metrics::record_trials(&results);

        SessionResults {
            results,
            trigger: self.trigger,
            timed_out,
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        let stream_id = event.stream_id();
        let outcome = match event {
            TransportEvent::HeadersReceived { stream_id, headers } => self
                .correlator
                .on_headers(stream_id, status_of(&headers))
                .map(|()| None),
            TransportEvent::DataReceived {
                stream_id,
                data,
                stream_ended,
            } => self
                .correlator
                .on_data(stream_id, data.len(), stream_ended)
                .map(Some),
            TransportEvent::StreamReset { stream_id, reason } => {
                tracing::warn!(%stream_id, %reason, "stream reset by transport");
                self.correlator.on_reset(stream_id).map(|()| None)
            }
        };

        match outcome {
            Ok(Some(DataOutcome::Ignored)) | Ok(None) => {}
            Ok(Some(outcome)) => {
                if let (Some(trigger), Some(bytes)) =
                    (self.trigger.as_mut(), outcome.bytes_received())
                {
                    trigger.on_data(stream_id, bytes, &PathMigration(&self.connection));
                }
            }
            Err(CorrelatorError::UnknownStream(id)) => {
                tracing::warn!(stream_id = %id, "event for unregistered stream");
                crate::metrics::record_unknown_stream(Protocol::Multiplexed);
            }
            Err(e) => tracing::warn!(%stream_id, error = %e, "event dropped"),
        }
    }
}
