//! The timer subsystem
use spin::Mutex as SpinMutex;
use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    sync::mpsc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::dpc::DpcQueue;

#[derive(Debug)]
enum TimerCmd {
    SetTimeout { timeout: Timeout },
}

/// A pending timeout.
#[derive(Debug, Clone, Copy)]
struct Timeout {
    at: Instant,
    /// Breaks ties between timeouts with the same `at`
    seq: u64,
    callback: fn(usize),
    param: usize,
}

impl Timeout {
    fn key(&self) -> (Instant, u64) {
        (self.at, self.seq)
    }
}

impl PartialEq for Timeout {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Timeout {}

impl PartialOrd for Timeout {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timeout {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

/// Pending timeouts, ordered by expiration time and then by registration
/// order.
#[derive(Debug, Default)]
struct TimeoutHeap {
    heap: BinaryHeap<Reverse<Timeout>>,
}

impl TimeoutHeap {
    fn push(&mut self, timeout: Timeout) {
        self.heap.push(Reverse(timeout));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(timeout)| timeout.at)
    }

    /// Remove and return the earliest timeout if it has expired by `now`.
    fn pop_expired(&mut self, now: Instant) -> Option<Timeout> {
        if self.next_deadline()? <= now {
            self.heap.pop().map(|Reverse(timeout)| timeout)
        } else {
            None
        }
    }
}

/// Runs a timer thread that posts expired timeouts' callbacks to the
/// deferred-work queue.
#[derive(Debug)]
pub(super) struct Timer {
    cmd_send: SpinMutex<Option<(mpsc::Sender<TimerCmd>, u64)>>,
    join_handle: SpinMutex<Option<JoinHandle<()>>>,
}

/// The timer has been stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct StoppedError;

impl Timer {
    pub(super) fn start(dpc: &'static DpcQueue) -> Self {
        let (cmd_send, cmd_recv) = mpsc::channel();

        log::trace!("starting the timer thread");
        let join_handle = thread::Builder::new()
            .name("timer".into())
            .spawn(move || {
                let mut pending = TimeoutHeap::default();
                loop {
                    let recv_result = if let Some(next_deadline) = pending.next_deadline() {
                        cmd_recv.recv_timeout(next_deadline.saturating_duration_since(Instant::now()))
                    } else {
                        cmd_recv
                            .recv()
                            .map_err(|_| mpsc::RecvTimeoutError::Disconnected)
                    };
                    match recv_result {
                        Err(mpsc::RecvTimeoutError::Disconnected) => {
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {}
                        Ok(TimerCmd::SetTimeout { timeout }) => {
                            pending.push(timeout);
                        }
                    }

                    let now = Instant::now();
                    while let Some(timeout) = pending.pop_expired(now) {
                        log::trace!("timeout expired: {timeout:?}");
                        if dpc.queue(timeout.callback, timeout.param).is_err() {
                            log::debug!("dropping {timeout:?}; the dpc queue is stopped");
                        }
                    }
                }

                if !pending.heap.is_empty() {
                    log::debug!("discarding {} pending timeout(s)", pending.heap.len());
                }
            })
            .unwrap_or_else(|e| panic!("failed to start the timer thread: {e}"));

        Self {
            cmd_send: SpinMutex::new(Some((cmd_send, 0))),
            join_handle: SpinMutex::new(Some(join_handle)),
        }
    }

    /// Arrange for `callback(param)` to be queued as deferred work after
    /// `delay` elapses.
    pub(super) fn set_timeout(
        &self,
        delay: Duration,
        callback: fn(usize),
        param: usize,
    ) -> Result<(), StoppedError> {
        let at = Instant::now() + delay;

        let mut cmd_send = self.cmd_send.lock();
        let (cmd_send, next_seq) = cmd_send.as_mut().ok_or(StoppedError)?;
        let seq = *next_seq;
        *next_seq += 1;

        cmd_send
            .send(TimerCmd::SetTimeout {
                timeout: Timeout {
                    at,
                    seq,
                    callback,
                    param,
                },
            })
            .map_err(|_| StoppedError)
    }

    /// Stop the timer thread. Pending timeouts are discarded.
    pub(super) fn stop(&self) {
        log::trace!("stopping the timer thread");
        // `cmd_recv.recv` will return `Err(_)` when we drop the
        // corresponding sender
        *self.cmd_send.lock() = None;

        let join_handle = self.join_handle.lock().take();
        if let Some(join_handle) = join_handle {
            let _ = join_handle.join();
        }
        log::trace!("stopped the timer thread");
    }
}
