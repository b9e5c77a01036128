use crate::correlator::error::{CorrelatorError, CorrelatorResult};
use crate::correlator::types::{DataOutcome, RequestDescriptor};
use crate::stats::{Protocol, TrialResult};
use crate::transport::StreamId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Maps transport stream ids to the logical requests riding on them.
///
/// Open exchanges live in `open`; the moment a stream ends its descriptor
/// moves to `done`, so a repeated end signal can never be counted twice.
#[derive(Debug, Default)]
pub struct StreamCorrelator {
    open: HashMap<StreamId, RequestDescriptor>,
    done: HashMap<StreamId, RequestDescriptor>,
    order: Vec<Slot>,
}

#[derive(Debug)]
enum Slot {
    Stream(StreamId),
    /// A request that never got onto a stream.
    Unsent(String),
}

impl StreamCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `stream_id`; the request clock starts now.
    pub fn register(
        &mut self,
        stream_id: StreamId,
        logical_path: impl Into<String>,
    ) -> CorrelatorResult<&RequestDescriptor> {
        if self.open.contains_key(&stream_id) || self.done.contains_key(&stream_id) {
            return Err(CorrelatorError::DuplicateStream(stream_id));
        }

        self.order.push(Slot::Stream(stream_id));
        Ok(self
            .open
            .entry(stream_id)
            .or_insert_with(|| RequestDescriptor::new(stream_id, logical_path.into())))
    }

    pub fn on_headers(&mut self, stream_id: StreamId, status: Option<u16>) -> CorrelatorResult<()> {
        match self.open.get_mut(&stream_id) {
            Some(descriptor) => {
                descriptor.status = status;
                Ok(())
            }
            None if self.done.contains_key(&stream_id) => Ok(()),
            None => Err(CorrelatorError::UnknownStream(stream_id)),
        }
    }

    /// Record a request that could not be put on a stream. It reports as a
    /// failed row with no bytes.
    pub fn register_unsent(&mut self, logical_path: impl Into<String>) {
        self.order.push(Slot::Unsent(logical_path.into()));
    }

    /// Account `chunk_len` bytes for the stream and close it on `stream_ended`.
    pub fn on_data(
        &mut self,
        stream_id: StreamId,
        chunk_len: usize,
        stream_ended: bool,
    ) -> CorrelatorResult<DataOutcome> {
        let Some(descriptor) = self.open.get_mut(&stream_id) else {
            if self.done.contains_key(&stream_id) {
                tracing::trace!(%stream_id, "event for finished stream ignored");
                return Ok(DataOutcome::Ignored);
            }
            return Err(CorrelatorError::UnknownStream(stream_id));
        };

        descriptor.bytes_received += chunk_len as u64;
        let bytes_received = descriptor.bytes_received;

        if !stream_ended {
            return Ok(DataOutcome::Progress { bytes_received });
        }

        let latency = self
            .close(stream_id, false)
            .ok_or(CorrelatorError::UnknownStream(stream_id))?;
        Ok(DataOutcome::Completed {
            bytes_received,
            latency,
        })
    }

    /// The transport gave up on the stream; close it without a latency.
    pub fn on_reset(&mut self, stream_id: StreamId) -> CorrelatorResult<()> {
        if self.close(stream_id, true).is_some() {
            Ok(())
        } else if self.done.contains_key(&stream_id) {
            Ok(())
        } else {
            Err(CorrelatorError::UnknownStream(stream_id))
        }
    }

    /// Move an open descriptor to `done`, returning its latency.
    fn close(&mut self, stream_id: StreamId, failed: bool) -> Option<Duration> {
        let mut descriptor = self.open.remove(&stream_id)?;
        let now = Instant::now();
        descriptor.completed = true;
        descriptor.failed = failed;
        descriptor.completed_at = Some(now);
        let latency = now.duration_since(descriptor.start_time);
        self.done.insert(stream_id, descriptor);
        Some(latency)
    }

    pub fn is_exchange_complete(&self, stream_id: StreamId) -> bool {
        self.done
            .get(&stream_id)
            .is_some_and(|descriptor| !descriptor.failed)
    }

    pub fn all_complete(&self) -> bool {
        self.open.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.open.len()
    }

    pub fn registered(&self) -> usize {
        self.order.len()
    }

    /// Registered stream ids, oldest first.
    pub fn stream_ids(&self) -> impl Iterator<Item = StreamId> + '_ {
        self.order.iter().filter_map(|slot| match slot {
            Slot::Stream(id) => Some(*id),
            Slot::Unsent(_) => None,
        })
    }

    pub fn descriptor(&self, stream_id: StreamId) -> Option<&RequestDescriptor> {
        self.open
            .get(&stream_id)
            .or_else(|| self.done.get(&stream_id))
    }

    /// One row per registered request, in registration order. Anything that
    /// did not finish cleanly becomes a timeout sample with its partial byte count.
    pub fn into_results(self, protocol: Protocol, trial_index: u32) -> Vec<TrialResult> {
        let Self {
            mut open,
            mut done,
            order,
        } = self;

        order
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Stream(id) => {
                    let d = done.remove(&id).or_else(|| open.remove(&id))?;
                    Some(match d.latency() {
                        Some(latency) => TrialResult::completed(
                            protocol,
                            trial_index,
                            d.logical_path,
                            latency,
                            d.bytes_received,
                            d.status,
                        ),
                        None => TrialResult::timed_out(
                            protocol,
                            trial_index,
                            d.logical_path,
                            d.bytes_received,
                            d.status,
                        ),
                    })
                }
                Slot::Unsent(path) => Some(TrialResult::timed_out(
                    protocol,
                    trial_index,
                    path,
                    0,
                    None,
                )),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicates() {
        let mut correlator = StreamCorrelator::new();
        correlator.register(StreamId(0), "/a").unwrap();
        assert_eq!(
            correlator.register(StreamId(0), "/b").unwrap_err(),
            CorrelatorError::DuplicateStream(StreamId(0))
        );

        correlator.on_data(StreamId(0), 0, true).unwrap();
        // Still a duplicate after completion
        assert!(correlator.register(StreamId(0), "/c").is_err());
    }

    #[test]
    fn test_unknown_stream_is_reported() {
        let mut correlator = StreamCorrelator::new();
        assert_eq!(
            correlator.on_data(StreamId(9), 10, false).unwrap_err(),
            CorrelatorError::UnknownStream(StreamId(9))
        );
        assert!(correlator.on_headers(StreamId(9), Some(200)).is_err());
        assert!(correlator.on_reset(StreamId(9)).is_err());
    }

    #[test]
    fn test_bytes_accumulate_until_stream_end() {
        let mut correlator = StreamCorrelator::new();
        correlator.register(StreamId(4), "/big").unwrap();

        assert_eq!(
            correlator.on_data(StreamId(4), 100, false).unwrap(),
            DataOutcome::Progress {
                bytes_received: 100
            }
        );
        assert!(!correlator.is_exchange_complete(StreamId(4)));

        match correlator.on_data(StreamId(4), 50, true).unwrap() {
            DataOutcome::Completed { bytes_received, .. } => assert_eq!(bytes_received, 150),
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(correlator.is_exchange_complete(StreamId(4)));
        assert!(correlator.all_complete());
    }

    #[test]
    fn test_repeated_stream_end_is_idempotent() {
        let mut correlator = StreamCorrelator::new();
        correlator.register(StreamId(0), "/a").unwrap();
        correlator.on_data(StreamId(0), 10, true).unwrap();

        assert_eq!(
            correlator.on_data(StreamId(0), 10, true).unwrap(),
            DataOutcome::Ignored
        );
        assert_eq!(
            correlator.descriptor(StreamId(0)).unwrap().bytes_received,
            10
        );

        let results = correlator.into_results(Protocol::Multiplexed, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bytes, 10);
    }

    #[test]
    fn test_all_complete_waits_for_every_stream() {
        let mut correlator = StreamCorrelator::new();
        for (i, path) in ["/a", "/b", "/c"].iter().enumerate() {
            correlator.register(StreamId(i as u64 * 4), *path).unwrap();
        }

        correlator.on_data(StreamId(8), 3, true).unwrap();
        correlator.on_data(StreamId(0), 1, true).unwrap();
        assert!(!correlator.all_complete());
        assert_eq!(correlator.pending(), 1);

        correlator.on_data(StreamId(4), 2, true).unwrap();
        assert!(correlator.all_complete());
    }

    #[test]
    fn test_pending_streams_become_timeout_rows() {
        let mut correlator = StreamCorrelator::new();
        correlator.register(StreamId(0), "/done").unwrap();
        correlator.register(StreamId(4), "/stuck").unwrap();
        correlator.on_headers(StreamId(0), Some(200)).unwrap();
        correlator.on_data(StreamId(0), 7, true).unwrap();
        correlator.on_data(StreamId(4), 5, false).unwrap();

        let results = correlator.into_results(Protocol::Multiplexed, 3);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].path, "/done");
        assert!(!results[0].is_timeout());
        assert_eq!(results[0].status, Some(200));
        assert_eq!(results[0].trial_index, 3);

        assert_eq!(results[1].path, "/stuck");
        assert!(results[1].is_timeout());
        assert_eq!(results[1].bytes, 5);
    }

    #[test]
    fn test_reset_stream_counts_as_failed() {
        let mut correlator = StreamCorrelator::new();
        correlator.register(StreamId(0), "/a").unwrap();
        correlator.on_data(StreamId(0), 42, false).unwrap();
        correlator.on_reset(StreamId(0)).unwrap();

        assert!(correlator.all_complete());
        assert!(!correlator.is_exchange_complete(StreamId(0)));

        let results = correlator.into_results(Protocol::Multiplexed, 1);
        assert!(results[0].is_timeout());
        assert_eq!(results[0].bytes, 42);
    }

    #[test]
    fn test_unsent_request_keeps_its_place() {
        let mut correlator = StreamCorrelator::new();
        correlator.register(StreamId(0), "/a").unwrap();
        correlator.register_unsent("/b");
        correlator.register(StreamId(4), "/c").unwrap();
        correlator.on_data(StreamId(0), 1, true).unwrap();
        correlator.on_data(StreamId(4), 1, true).unwrap();

        assert!(correlator.all_complete());
        assert_eq!(correlator.registered(), 3);
        assert_eq!(
            correlator.stream_ids().collect::<Vec<_>>(),
            vec![StreamId(0), StreamId(4)]
        );

        let results = correlator.into_results(Protocol::Multiplexed, 1);
        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c"]);
        assert!(results[1].is_timeout());
        assert_eq!(results[1].bytes, 0);
        assert_eq!(results[1].status, None);
    }
}
