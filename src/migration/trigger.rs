use crate::migration::disruptor::Disruptor;
use crate::transport::StreamId;

/// Bytes on the monitored stream after which the disruption fires.
pub const DEFAULT_MIGRATION_THRESHOLD: u64 = 2_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Armed,
    Fired,
}

/// Fires a disruption once, the first time the monitored stream's byte count
/// goes past the threshold. There is no way back to `Armed`.
#[derive(Debug, Clone)]
pub struct MigrationTrigger {
    stream_id: StreamId,
    threshold: u64,
    state: TriggerState,
    fired_at_bytes: Option<u64>,
    succeeded: Option<bool>,
}

impl MigrationTrigger {
    pub fn new(stream_id: StreamId, threshold: u64) -> Self {
        Self {
            stream_id,
            threshold,
            state: TriggerState::Armed,
            fired_at_bytes: None,
            succeeded: None,
        }
    }

    pub fn with_default_threshold(stream_id: StreamId) -> Self {
        Self::new(stream_id, DEFAULT_MIGRATION_THRESHOLD)
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Cumulative byte count seen when the trigger fired.
    pub fn fired_at_bytes(&self) -> Option<u64> {
        self.fired_at_bytes
    }

    /// Whether the disruption itself went through. `None` until fired.
    pub fn succeeded(&self) -> Option<bool> {
        self.succeeded
    }

    /// Feed the cumulative byte count of `stream_id`. Returns true on the
    /// call that fires. Failures of the disruption are logged, never raised.
    pub fn on_data<D>(&mut self, stream_id: StreamId, bytes_received: u64, disruptor: &D) -> bool
    where
        D: Disruptor + ?Sized,
    {
        if self.state == TriggerState::Fired
            || stream_id != self.stream_id
            || bytes_received <= self.threshold
        {
            return false;
        }

        self.state = TriggerState::Fired;
        self.fired_at_bytes = Some(bytes_received);

        tracing::info!(
            %stream_id,
            bytes_received,
            threshold = self.threshold,
            "simulating network change"
        );

        match disruptor.disrupt() {
            Ok(()) => {
                self.succeeded = Some(true);
                crate::metrics::record_migration(true);
            }
            Err(e) => {
                self.succeeded = Some(false);
                crate::metrics::record_migration(false);
                tracing::warn!(%stream_id, error = %e, "migration failed; transfer continues");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::error::{MigrationError, MigrationResult};
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingDisruptor {
        calls: Cell<u32>,
        fail: bool,
    }

    impl Disruptor for CountingDisruptor {
        fn disrupt(&self) -> MigrationResult<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(MigrationError::Failed("no route".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_fires_once_on_first_crossing() {
        let disruptor = CountingDisruptor::default();
        let mut trigger = MigrationTrigger::with_default_threshold(StreamId(0));

        let mut fired_on = Vec::new();
        let mut total = 0;
        for step in 1..=30 {
            total += 100_000;
            if trigger.on_data(StreamId(0), total, &disruptor) {
                fired_on.push(step);
            }
        }

        assert_eq!(disruptor.calls.get(), 1);
        // 2,000,000 exactly does not count; 2,100,000 does
        assert_eq!(fired_on, vec![21]);
        assert_eq!(trigger.fired_at_bytes(), Some(2_100_000));
        assert_eq!(trigger.state(), TriggerState::Fired);
    }

    #[test]
    fn test_other_streams_are_not_monitored() {
        let disruptor = CountingDisruptor::default();
        let mut trigger = MigrationTrigger::new(StreamId(4), 10);

        assert!(!trigger.on_data(StreamId(0), 1_000, &disruptor));
        assert_eq!(trigger.state(), TriggerState::Armed);
        assert!(trigger.on_data(StreamId(4), 11, &disruptor));
    }

    #[test]
    fn test_failed_disruption_is_swallowed() {
        let disruptor = CountingDisruptor {
            fail: true,
            ..Default::default()
        };
        let mut trigger = MigrationTrigger::new(StreamId(0), 10);

        assert!(trigger.on_data(StreamId(0), 20, &disruptor));
        assert_eq!(trigger.succeeded(), Some(false));
        assert!(!trigger.on_data(StreamId(0), 30, &disruptor));
        assert_eq!(disruptor.calls.get(), 1);
    }
}
