//! The thread table
use kindle_kernel::ThreadAttr;
use slab::Slab;
use std::vec::Vec;

/// Scheduler state. Protected by `State::sched`.
#[derive(Debug)]
pub(super) struct SchedState {
    /// CPU Lock. Ready threads are held back while this is set.
    pub(super) cpu_lock: bool,
    pub(super) context_up: bool,
    pub(super) heap_up: bool,
    /// `None` until the scheduler is initialized.
    threads: Option<Slab<ThreadCb>>,
}

#[derive(Debug)]
struct ThreadCb {
    attr: ThreadAttr,
    tsm: ThreadState,
}

/// The state of a thread managed by the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Created but not eligible to run.
    Dormant,
    /// Eligible to run, waiting for CPU Lock to be released.
    Ready,
    /// Backed by a running host thread.
    Running,
    /// The entry point returned the contained exit code.
    Exited(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SchedError {
    /// The scheduler isn't initialized.
    NotInitialized,
    /// No such thread.
    BadId,
    /// The thread isn't in the state required by the operation.
    BadObjectState,
}

impl SchedState {
    pub(super) const fn new() -> Self {
        Self {
            cpu_lock: true,
            context_up: false,
            heap_up: false,
            threads: None,
        }
    }

    pub(super) fn init_threads(&mut self) {
        assert!(self.threads.is_none(), "the scheduler is already initialized");
        self.threads = Some(Slab::new());
    }

    pub(super) fn is_initialized(&self) -> bool {
        self.threads.is_some()
    }

    fn threads(&mut self) -> Result<&mut Slab<ThreadCb>, SchedError> {
        self.threads.as_mut().ok_or(SchedError::NotInitialized)
    }

    fn thread(&mut self, index: usize) -> Result<&mut ThreadCb, SchedError> {
        self.threads()?.get_mut(index).ok_or(SchedError::BadId)
    }

    /// Register a new thread in the `Dormant` state.
    pub(super) fn create(&mut self, attr: ThreadAttr) -> Result<usize, SchedError> {
        let threads = self.threads()?;
        Ok(threads.insert(ThreadCb {
            attr,
            tsm: ThreadState::Dormant,
        }))
    }

    /// Transition a `Dormant` thread to `Ready`.
    pub(super) fn resume(&mut self, index: usize) -> Result<(), SchedError> {
        let thread = self.thread(index)?;
        if thread.tsm != ThreadState::Dormant {
            return Err(SchedError::BadObjectState);
        }
        thread.tsm = ThreadState::Ready;
        Ok(())
    }

    /// Transition every `Ready` thread to `Running` and return them, unless
    /// CPU Lock is active.
    pub(super) fn take_ready(&mut self) -> Vec<(usize, ThreadAttr)> {
        if self.cpu_lock {
            return Vec::new();
        }

        let threads = match &mut self.threads {
            Some(threads) => threads,
            None => return Vec::new(),
        };

        threads
            .iter_mut()
            .filter(|(_, thread)| thread.tsm == ThreadState::Ready)
            .map(|(index, thread)| {
                thread.tsm = ThreadState::Running;
                (index, thread.attr)
            })
            .collect()
    }

    /// Record the exit code of a `Running` thread.
    pub(super) fn exit(&mut self, index: usize, code: i32) -> Result<(), SchedError> {
        let thread = self.thread(index)?;
        if thread.tsm != ThreadState::Running {
            return Err(SchedError::BadObjectState);
        }
        thread.tsm = ThreadState::Exited(code);
        Ok(())
    }

    pub(super) fn thread_state(&self, index: usize) -> Option<ThreadState> {
        Some(self.threads.as_ref()?.get(index)?.tsm)
    }
}
