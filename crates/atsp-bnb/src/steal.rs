use std::{
    mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        Condvar, Mutex, PoisonError, TryLockError,
    },
};

use atsp_core::SearchStack;

use crate::{Error, Result};

/// What an idle worker got back from [`WorkShare::request_work`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkRequest {
    /// A sibling donated this many tours.
    Received(usize),
    /// No work is left in the process. `last` is set for the worker whose
    /// idling ended the local search; it reports completion to the peers.
    Done { last: bool },
}

#[derive(Debug)]
struct Mailbox {
    // Empty stack of the single outstanding requester.
    request: Option<SearchStack>,
    // The same stack after a donor filled it.
    response: Option<SearchStack>,
    running: usize,
    finished: bool,
}

/// Intra-process work stealing through a single-slot mailbox.
///
/// An idle worker parks its empty stack in the mailbox and sleeps. Busy
/// workers peek at the mailbox between node expansions and, when their own
/// stack is large enough, split it into the parked one.
#[derive(Debug)]
pub struct WorkShare {
    min_split_size: usize,
    pending: AtomicBool,
    mailbox: Mutex<Mailbox>,
    wake: Condvar,
}

impl WorkShare {
    pub fn new(threads: usize, min_split_size: usize) -> Self {
        Self {
            min_split_size,
            pending: AtomicBool::new(false),
            mailbox: Mutex::new(Mailbox {
                request: None,
                response: None,
                running: threads,
                finished: false,
            }),
            wake: Condvar::new(),
        }
    }

    /// Workers currently holding work, parked requesters excluded.
    pub fn running(&self) -> Result<usize> {
        Ok(self.mailbox.lock()?.running)
    }

    /// Called by a worker whose stack ran dry. Blocks until a sibling
    /// donates or the process runs out of work.
    pub fn request_work(&self, stack: &mut SearchStack) -> Result<WorkRequest> {
        let mut mailbox = self.mailbox.lock()?;
        mailbox.running = mailbox.running.saturating_sub(1);

        if mailbox.running == 0 && !mailbox.finished {
            log::debug!("last running worker went idle");
            mailbox.finished = true;
            self.pending.store(false, Ordering::Release);
            self.wake.notify_all();
            return Ok(WorkRequest::Done { last: true });
        }

        // At most one outstanding request at a time.
        while (mailbox.request.is_some() || mailbox.response.is_some()) && !mailbox.finished {
            mailbox = self.wake.wait(mailbox)?;
        }
        if mailbox.finished {
            return Ok(WorkRequest::Done { last: false });
        }

        mailbox.request = Some(mem::take(stack));
        self.pending.store(true, Ordering::Release);

        loop {
            if mailbox.finished {
                if let Some(own) = mailbox.request.take().or_else(|| mailbox.response.take()) {
                    *stack = own;
                }
                self.pending.store(false, Ordering::Release);
                return Ok(WorkRequest::Done { last: false });
            }
            if let Some(filled) = mailbox.response.take() {
                *stack = filled;
                // Let the next requester in.
                self.wake.notify_all();
                return Ok(WorkRequest::Received(stack.len()));
            }
            mailbox = self.wake.wait(mailbox)?;
        }
    }

    /// Cheap check made by a busy worker between expansions. Never blocks:
    /// if the mailbox is contended the donation is simply skipped. Returns
    /// the number of tours handed over.
    pub fn share_work(&self, stack: &mut SearchStack) -> Result<Option<usize>> {
        if stack.len() < self.min_split_size || !self.pending.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut mailbox = match self.mailbox.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Ok(None),
            Err(TryLockError::Poisoned(e)) => return Err(Error::Poisoned(e.to_string())),
        };
        let Some(mut dst) = mailbox.request.take() else {
            return Ok(None);
        };

        let moved = match stack.split_into(&mut dst) {
            Ok(moved) => moved,
            Err(e) => {
                mailbox.request = Some(dst);
                return Err(e.into());
            }
        };
        // The requester counts as running from the moment its stack is
        // filled, so the search cannot be declared over while it sleeps.
        mailbox.running += 1;
        mailbox.response = Some(dst);
        self.pending.store(false, Ordering::Release);
        self.wake.notify_all();
        Ok(Some(moved))
    }

    /// Releases every parked worker, e.g. after a fatal error elsewhere.
    pub fn shutdown(&self) {
        let mut mailbox = self.mailbox.lock().unwrap_or_else(PoisonError::into_inner);
        mailbox.finished = true;
        self.pending.store(false, Ordering::Release);
        self.wake.notify_all();
    }
}
