//! In-process fakes of the transports and of `tc`, for running the dispatcher
//! and orchestrator without a network or root.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use muxbench::baseline::{BaselineClient, BaselineError, BaselineFetch, BaselineResult};
use muxbench::fault::{FaultError, FaultExecutor, FaultResult};
use muxbench::transport::{
    header_value, HeaderList, MultiplexedConnection, MultiplexedConnector, StreamId,
    TransportError, TransportEvent, TransportResult,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const CHUNK: usize = 100_000;

/// How a scripted connection answers each path.
#[derive(Clone, Default)]
pub struct Script {
    /// Body length per path; paths not listed get a 404 with no body.
    pub bodies: HashMap<String, usize>,
    /// Paths whose stream never ends.
    pub stalled: HashSet<String>,
    /// Emit data for a stream nobody opened.
    pub inject_unknown: bool,
    /// Send the end-of-stream signal of the first stream to finish twice.
    pub repeat_first_finish: bool,
    /// Refuse to connect at all.
    pub refuse: bool,
    /// Paths whose request headers the transport fails to send.
    pub fail_send: HashSet<String>,
    /// Once this many streams are open, opening another never returns.
    pub stall_open_after: Option<usize>,
}

impl Script {
    pub fn with_bodies(bodies: &[(&str, usize)]) -> Self {
        Self {
            bodies: bodies.iter().map(|(p, n)| (p.to_string(), *n)).collect(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedConnector {
    pub script: Script,
    pub connections: Arc<AtomicU32>,
    pub path_changes: Arc<AtomicU32>,
    /// Paths in the order their headers were sent, across all connections.
    pub sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MultiplexedConnector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn open_connection(&self) -> TransportResult<ScriptedConnection> {
        if self.script.refuse {
            return Err(TransportError::ConnectionFailed("refused".into()));
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedConnection {
            script: self.script.clone(),
            next_id: 0,
            streams: Vec::new(),
            finished: HashSet::new(),
            events: None,
            path_changes: self.path_changes.clone(),
            sent: self.sent.clone(),
            closed: false,
        })
    }
}

pub struct ScriptedConnection {
    script: Script,
    next_id: u64,
    streams: Vec<(StreamId, String)>,
    finished: HashSet<StreamId>,
    events: Option<VecDeque<TransportEvent>>,
    path_changes: Arc<AtomicU32>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

impl ScriptedConnection {
    /// Per stream: headers, body chunks, end. Streams are then interleaved
    /// round-robin starting from the last one opened, so completion order
    /// is unrelated to request order.
    fn build_events(&self) -> VecDeque<TransportEvent> {
        let mut per_stream: Vec<VecDeque<TransportEvent>> = self
            .streams
            .iter()
            .rev()
            .map(|(id, path)| {
                let mut events = VecDeque::new();
                let body = self.script.bodies.get(path).copied();
                let status = if body.is_some() { "200" } else { "404" };
                events.push_back(TransportEvent::HeadersReceived {
                    stream_id: *id,
                    headers: vec![(":status".to_string(), status.to_string())],
                });

                let mut remaining = body.unwrap_or(0);
                while remaining > 0 {
                    let n = remaining.min(CHUNK);
                    events.push_back(TransportEvent::DataReceived {
                        stream_id: *id,
                        data: Bytes::from(vec![0u8; n]),
                        stream_ended: false,
                    });
                    remaining -= n;
                }

                if !self.script.stalled.contains(path) {
                    events.push_back(TransportEvent::DataReceived {
                        stream_id: *id,
                        data: Bytes::new(),
                        stream_ended: true,
                    });
                }
                events
            })
            .collect();

        let mut merged = VecDeque::new();
        if self.script.inject_unknown {
            merged.push_back(TransportEvent::DataReceived {
                stream_id: StreamId(999),
                data: Bytes::from_static(b"stray"),
                stream_ended: true,
            });
        }
        while per_stream.iter().any(|q| !q.is_empty()) {
            for queue in per_stream.iter_mut() {
                if let Some(event) = queue.pop_front() {
                    merged.push_back(event);
                }
            }
        }
        if self.script.repeat_first_finish {
            let first_end = merged.iter().position(|e| {
                matches!(e, TransportEvent::DataReceived { stream_ended: true, stream_id, .. } if *stream_id != StreamId(999))
            });
            if let Some(pos) = first_end {
                let stream_id = merged[pos].stream_id();
                merged.insert(
                    pos + 1,
                    TransportEvent::DataReceived {
                        stream_id,
                        data: Bytes::from_static(b"late"),
                        stream_ended: true,
                    },
                );
            }
        }
        merged
    }
}

#[async_trait]
impl MultiplexedConnection for ScriptedConnection {
    async fn open_stream(&mut self) -> TransportResult<StreamId> {
        if self
            .script
            .stall_open_after
            .is_some_and(|n| self.streams.len() >= n)
        {
            std::future::pending::<()>().await;
        }
        let id = StreamId(self.next_id);
        self.next_id += 4;
        Ok(id)
    }

    async fn send_headers(&mut self, stream_id: StreamId, headers: HeaderList) -> TransportResult<()> {
        let path = header_value(&headers, ":path")
            .ok_or_else(|| TransportError::Protocol("missing :path".into()))?
            .to_string();
        if self.script.fail_send.contains(&path) {
            return Err(TransportError::SendFailed("stream reset by peer".into()));
        }
        self.sent.lock().push(path.clone());
        self.streams.push((stream_id, path));
        Ok(())
    }

    async fn send_data(
        &mut self,
        stream_id: StreamId,
        _data: Bytes,
        end_stream: bool,
    ) -> TransportResult<()> {
        if end_stream {
            self.finished.insert(stream_id);
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.events.is_none() {
            assert_eq!(
                self.finished.len(),
                self.streams.len(),
                "every request must be fully sent before responses are read"
            );
            self.events = Some(self.build_events());
        }

        let next = self.events.as_mut().and_then(VecDeque::pop_front);
        match next {
            Some(event) => Some(event),
            None if !self.script.stalled.is_empty() => std::future::pending().await,
            None => None,
        }
    }

    fn change_path_identifier(&self) -> TransportResult<()> {
        self.path_changes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Baseline client answering from a table, recording each call.
#[derive(Clone, Default)]
pub struct FakeBaseline {
    pub bodies: HashMap<String, u64>,
    pub stalled: HashSet<String>,
    pub latency: Duration,
    pub refuse: bool,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeBaseline {
    pub fn with_bodies(bodies: &[(&str, u64)]) -> Self {
        Self {
            bodies: bodies.iter().map(|(p, n)| (p.to_string(), *n)).collect(),
            latency: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn answer(&self, path: &str) -> BaselineResult<BaselineFetch> {
        if self.refuse {
            return Err(BaselineError::Connect("refused".into()));
        }
        self.calls.lock().push(path.to_string());

        let body = self.bodies.get(path).copied();
        let mut fetch = BaselineFetch {
            status: Some(if body.is_some() { 200 } else { 404 }),
            bytes: body.unwrap_or(0),
            ..Default::default()
        };
        if self.stalled.contains(path) {
            fetch.bytes /= 2;
        } else {
            fetch.elapsed = Some(self.latency);
        }
        Ok(fetch)
    }
}

#[async_trait]
impl BaselineClient for FakeBaseline {
    async fn get(&self, path: &str, _timeout: Duration) -> BaselineResult<BaselineFetch> {
        tokio::time::sleep(self.latency).await;
        self.answer(path)
    }

    async fn get_disrupted(
        &self,
        path: &str,
        _timeout: Duration,
        threshold: u64,
        _settle: Duration,
    ) -> BaselineResult<BaselineFetch> {
        let mut fetch = self.answer(path)?;
        if fetch.bytes > threshold {
            fetch.disrupted_at = Some(threshold + 1);
            fetch.reconnects = 1;
        }
        Ok(fetch)
    }
}

/// Stands in for `tc`: tracks whether a qdisc is installed.
#[derive(Default)]
pub struct FakeTc {
    pub commands: Mutex<Vec<String>>,
    pub installed: Mutex<Option<String>>,
    /// 1-based index of the `add` call that fails.
    pub fail_add_on: Option<usize>,
    /// Every command fails.
    pub broken: bool,
    /// `del` fails even when a qdisc is installed.
    pub refuse_del: bool,
    adds: AtomicU32,
}

impl FakeTc {
    pub fn failing_add(n: usize) -> Self {
        Self {
            fail_add_on: Some(n),
            ..Default::default()
        }
    }

    pub fn refusing_del() -> Self {
        Self {
            refuse_del: true,
            ..Default::default()
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    pub fn installed(&self) -> Option<String> {
        self.installed.lock().clone()
    }
}

#[async_trait]
impl FaultExecutor for FakeTc {
    async fn execute(&self, args: &[String]) -> FaultResult<()> {
        let rendered = args.join(" ");
        self.commands.lock().push(rendered.clone());
        let fail = |stderr: &str| FaultError::CommandFailed {
            command: rendered.clone(),
            stderr: stderr.to_string(),
        };

        if self.broken {
            return Err(fail("tc: command not found"));
        }

        match args.get(1).map(String::as_str) {
            Some("del") if self.refuse_del => Err(fail("RTNETLINK answers: Operation not permitted")),
            Some("del") => match self.installed.lock().take() {
                Some(_) => Ok(()),
                None => Err(fail("Cannot delete qdisc with handle of zero.")),
            },
            Some("add") => {
                let n = self.adds.fetch_add(1, Ordering::SeqCst) as usize + 1;
                if self.fail_add_on == Some(n) {
                    return Err(fail("RTNETLINK answers: Operation not permitted"));
                }
                *self.installed.lock() = Some(rendered.clone());
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

pub fn paths(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}
