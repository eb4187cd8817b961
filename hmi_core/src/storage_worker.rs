//! Background profile persistence.
//!
//! Spawns a thread that owns the `ProfileStore`, receives profile snapshots
//! over a bounded channel and reports each save result on a second channel.
//! The atomic-commit contract of `ProfileStore::save` is unchanged.
//!
//! Each `SaveWorker` spawns exactly one thread. Dropping the worker closes the
//! request channel; queued saves are still written before the thread exits
//! and is joined.
use crossbeam_channel as xch;
use hmi_traits::FlashFs;
use std::time::Duration;

use crate::error::StoreError;
use crate::params::MouldParams;
use crate::store::ProfileStore;

/// Saves that may wait in the queue before `submit` reports `WorkerBusy`.
pub const QUEUE_DEPTH: usize = 4;

struct SaveRequest {
    seq: u64,
    profiles: Vec<MouldParams>,
}

/// Result of one background save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub seq: u64,
    pub count: usize,
    pub result: Result<(), StoreError>,
}

pub struct SaveWorker {
    tx: Option<xch::Sender<SaveRequest>>,
    results: xch::Receiver<SaveOutcome>,
    next_seq: u64,
    in_flight: usize,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl SaveWorker {
    pub fn spawn<F: FlashFs + Send + 'static>(mut store: ProfileStore<F>) -> Self {
        let (tx, rx) = xch::bounded::<SaveRequest>(QUEUE_DEPTH);
        let (done_tx, results) = xch::unbounded();

        let join_handle = std::thread::spawn(move || {
            // recv() drains queued requests before reporting disconnection
            while let Ok(req) = rx.recv() {
                let count = req.profiles.len();
                let result = store.save(&req.profiles);
                tracing::debug!(seq = req.seq, count, ok = result.is_ok(), "background save finished");
                if done_tx
                    .send(SaveOutcome {
                        seq: req.seq,
                        count,
                        result,
                    })
                    .is_err()
                {
                    tracing::debug!("save result consumer gone");
                }
            }
            tracing::trace!("save worker exiting cleanly");
        });

        Self {
            tx: Some(tx),
            results,
            next_seq: 0,
            in_flight: 0,
            join_handle: Some(join_handle),
        }
    }

    /// Queue a snapshot for saving. Returns its sequence number.
    pub fn submit(&mut self, profiles: Vec<MouldParams>) -> Result<u64, StoreError> {
        let tx = self.tx.as_ref().ok_or(StoreError::WorkerGone)?;
        let seq = self.next_seq;
        match tx.try_send(SaveRequest { seq, profiles }) {
            Ok(()) => {
                self.next_seq += 1;
                self.in_flight += 1;
                Ok(seq)
            }
            Err(xch::TrySendError::Full(_)) => Err(StoreError::WorkerBusy),
            Err(xch::TrySendError::Disconnected(_)) => Err(StoreError::WorkerGone),
        }
    }

    /// Saves submitted whose result has not been collected yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Results that have arrived since the last call, oldest first.
    pub fn completed(&mut self) -> Vec<SaveOutcome> {
        let done: Vec<SaveOutcome> = self.results.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Block up to `timeout` for the next result.
    pub fn wait(&mut self, timeout: Duration) -> Option<SaveOutcome> {
        let done = self.results.recv_timeout(timeout).ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(done)
    }

    /// Collect every outstanding result, giving up once `timeout` passes.
    pub fn drain(&mut self, timeout: Duration) -> Vec<SaveOutcome> {
        let deadline = std::time::Instant::now() + timeout;
        let mut out = self.completed();
        while self.in_flight > 0 {
            let left = deadline.saturating_duration_since(std::time::Instant::now());
            match self.wait(left) {
                Some(done) => out.push(done),
                None => break,
            }
        }
        out
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        // closing the channel lets the thread finish queued saves and exit
        self.tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("save worker joined");
                }
                Err(e) => {
                    tracing::warn!(?e, "save worker panicked during shutdown");
                }
            }
        }
    }
}
