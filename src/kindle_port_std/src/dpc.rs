//! The deferred-work queue
use spin::Mutex as SpinMutex;
use std::{
    panic,
    sync::mpsc,
    thread::{self, JoinHandle},
};

use crate::{Event, State, ThreadRole, THREAD_ROLE};

/// A unit of deferred work.
#[derive(Debug, Clone, Copy)]
struct Work {
    func: fn(usize),
    param: usize,
}

/// Executes deferred work items one at a time, in the order they were
/// queued, on a dedicated worker thread.
#[derive(Debug)]
pub(super) struct DpcQueue {
    work_send: SpinMutex<Option<mpsc::Sender<Work>>>,
    join_handle: SpinMutex<Option<JoinHandle<()>>>,
}

/// The queue has been stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct StoppedError;

impl DpcQueue {
    /// Start the worker thread. A panic in a work item is reported to
    /// `port`, and the worker stops.
    pub(super) fn start(port: &'static State) -> Self {
        let (work_send, work_recv) = mpsc::channel::<Work>();

        log::trace!("starting the dpc worker thread");
        let join_handle = thread::Builder::new()
            .name("dpc".into())
            .spawn(move || {
                THREAD_ROLE.with(|role| role.set(ThreadRole::Thread));

                // `recv` returns `Err(_)` after every sender is dropped and
                // the backlog is drained
                for work in work_recv.iter() {
                    log::trace!("running dpc {work:?}");
                    if let Err(e) = panic::catch_unwind(|| (work.func)(work.param)) {
                        port.post_event(Event::Panicked(e));
                        break;
                    }
                }

                log::trace!("the dpc worker thread is exiting");
            })
            .unwrap_or_else(|e| panic!("failed to start the dpc worker thread: {e}"));

        Self {
            work_send: SpinMutex::new(Some(work_send)),
            join_handle: SpinMutex::new(Some(join_handle)),
        }
    }

    /// Append a work item to the queue.
    pub(super) fn queue(&self, func: fn(usize), param: usize) -> Result<(), StoppedError> {
        let work_send = self.work_send.lock();
        let work_send = work_send.as_ref().ok_or(StoppedError)?;
        work_send
            .send(Work { func, param })
            .map_err(|_| StoppedError)
    }

    /// Stop accepting new work, drain the backlog, and wait for the worker
    /// thread to exit.
    ///
    /// Must not be called from a work item.
    pub(super) fn stop(&self) {
        log::trace!("stopping the dpc worker thread");
        *self.work_send.lock() = None;

        let join_handle = self.join_handle.lock().take();
        if let Some(join_handle) = join_handle {
            // Panics are caught inside the worker
            let _ = join_handle.join();
        }
        log::trace!("stopped the dpc worker thread");
    }
}
