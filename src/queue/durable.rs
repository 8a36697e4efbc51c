//! A FIFO [`Queue`] with at-least-once delivery, backed in memory by a
//! `VecDeque` and optionally by a crash-durable [`RecordLog`]. `receive`
//! blocks the calling thread per its `timeout_ms` argument via a
//! [`Condvar`], and `close` wakes every blocked waiter so a service
//! shutdown never leaves a listener hanging.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{PointError, Result};
use crate::log::RecordLog;
use crate::model::VersionedValue;
use crate::wire;

use super::Queue;

const RECORD_SEND: u8 = 0;
const RECORD_COMMIT: u8 = 1;

struct State {
    pending: VecDeque<VersionedValue>,
    in_flight: VecDeque<VersionedValue>,
    closed: bool,
}

pub struct DurableQueue {
    state: Mutex<State>,
    not_empty: Condvar,
    log: Option<Mutex<RecordLog>>,
}

impl DurableQueue {
    /// A queue with no backing log: at-least-once delivery holds only
    /// until the process exits.
    pub fn in_memory() -> Self {
        DurableQueue {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                in_flight: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            log: None,
        }
    }

    /// Opens (or creates) a queue backed by a log at `path`, replaying it
    /// to reconstruct whatever was pending when the process last exited.
    pub fn open(path: &Path) -> Result<Self> {
        let mut log = RecordLog::open(path)?;
        let mut sent = Vec::new();
        let mut committed = HashSet::new();
        log.replay(|body| {
            let (&kind, rest) = body
                .split_first()
                .ok_or_else(|| PointError::Corruption("empty queue log record".into()))?;
            match kind {
                RECORD_SEND => {
                    let (versioned, _) = wire::decode_versioned(rest)?;
                    sent.push(versioned);
                }
                RECORD_COMMIT => {
                    if rest.len() < 8 {
                        return Err(PointError::Corruption("truncated commit record".into()));
                    }
                    let version = u64::from_be_bytes(rest[0..8].try_into().unwrap());
                    committed.insert(version);
                }
                other => {
                    return Err(PointError::Corruption(format!(
                        "unknown queue log record kind {other}"
                    )))
                }
            }
            Ok(())
        })?;

        let pending: VecDeque<VersionedValue> = sent
            .into_iter()
            .filter(|v| !committed.contains(&v.version))
            .collect();

        Ok(DurableQueue {
            state: Mutex::new(State {
                pending,
                in_flight: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            log: Some(Mutex::new(log)),
        })
    }
}

impl Queue for DurableQueue {
    fn send(&self, versioned: VersionedValue) -> Result<()> {
        if let Some(log) = &self.log {
            let mut body = vec![RECORD_SEND];
            wire::encode_versioned(&versioned, &mut body);
            let mut log = log.lock();
            log.append(&body)?;
            log.sync()?;
        }
        let mut state = self.state.lock();
        state.pending.push_back(versioned);
        self.not_empty.notify_all();
        Ok(())
    }

    fn receive(&self, limit: usize, timeout_ms: i64) -> Result<Vec<VersionedValue>> {
        let limit = limit.max(1);
        let mut state = self.state.lock();
        loop {
            if !state.in_flight.is_empty() || !state.pending.is_empty() {
                let mut out: Vec<VersionedValue> = state.in_flight.iter().cloned().collect();
                while out.len() < limit {
                    match state.pending.pop_front() {
                        Some(next) => {
                            state.in_flight.push_back(next.clone());
                            out.push(next);
                        }
                        None => break,
                    }
                }
                return Ok(out);
            }
            if state.closed {
                return Err(PointError::Cancelled);
            }
            if timeout_ms == 0 {
                return Ok(Vec::new());
            }
            if timeout_ms < 0 {
                self.not_empty.wait(&mut state);
            } else {
                let result = self
                    .not_empty
                    .wait_for(&mut state, Duration::from_millis(timeout_ms as u64));
                if result.timed_out() {
                    return Err(PointError::Cancelled);
                }
            }
        }
    }

    fn commit(&self, version: u64) -> Result<()> {
        let mut state = self.state.lock();
        match state.in_flight.iter().position(|v| v.version == version) {
            Some(pos) => {
                state.in_flight.remove(pos);
                if let Some(log) = &self.log {
                    let mut body = vec![RECORD_COMMIT];
                    body.extend_from_slice(&version.to_be_bytes());
                    let mut log = log.lock();
                    log.append(&body)?;
                    log.sync()?;
                }
                Ok(())
            }
            None => Err(PointError::BadParameter(format!(
                "commit version {version} is not in flight"
            ))),
        }
    }

    fn rollback(&self) {
        let mut state = self.state.lock();
        while let Some(in_flight) = state.in_flight.pop_back() {
            state.pending.push_front(in_flight);
        }
    }

    fn purge(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let removed = (state.pending.len() + state.in_flight.len()) as u64;
        state.pending.clear();
        state.in_flight.clear();
        Ok(removed)
    }

    fn len(&self) -> usize {
        let state = self.state.lock();
        state.pending.len() + state.in_flight.len()
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
    }
}
