// SPDX-License-Identifier: MIT
//! # Design: worker pool over mailboxes and semaphore pairs
//!
//! ## Overview
//! A fixed pool of workers, each paired with the dispatcher through
//!
//! - one [`Mailbox`]: a single record holding the current job and its result,
//! - one [`SyncPair`]: two counters in a shared [`Signals`] array,
//!   `ready` (dispatcher to worker, "job written") and `done` (worker to
//!   dispatcher, "result written, mailbox is yours again").
//!
//! The record itself carries no lock. Whoever last received a signal owns
//! the mailbox; the other side only touches it after the next signal.
//!
//! ```text
//!         +--------------------------------------+
//!         |              Dispatcher              |
//!         +----+-------------+-------------+-----+
//!              |             |             |
//!      mailbox + ready  mailbox + ready  mailbox + ready
//!              |             |             |
//!         +----v----+   +----v----+   +----v----+
//!         | worker1 |   | worker2 |   | worker3 |
//!         +----+----+   +----+----+   +----+----+
//!              |             |             |
//!            done          done          done
//! ```
//!
//! ## Backends
//! A [`Backend`] allocates mailboxes and the signal array and spawns workers.
//! [`process::ProcessBackend`] uses System V shared memory, System V
//! semaphores and `fork`; [`thread::ThreadBackend`] uses in-process records,
//! `Mutex`/`Condvar` counters and OS threads. The protocol above is the same
//! for both.

use std::sync::Arc;

use crate::error::Result;

pub mod mailbox;
pub mod process;
pub mod thread;
pub mod worker;
pub mod worker_pool;

pub use mailbox::MailboxRecord;
pub use worker_pool::WorkerPool;

/// One shared job record.
pub trait Mailbox {
    fn load(&self) -> MailboxRecord;
    fn store(&self, record: MailboxRecord);
}

/// An array of counting semaphores.
pub trait Signals {
    /// Blocks until counter `index` is positive, then decrements it.
    fn wait(&self, index: usize) -> Result<()>;
    /// Increments counter `index`.
    fn signal(&self, index: usize) -> Result<()>;
    /// Reads counter `index` without blocking or changing it.
    fn peek(&self, index: usize) -> Result<i32>;
}

impl<M: Mailbox + ?Sized> Mailbox for Arc<M> {
    fn load(&self) -> MailboxRecord {
        (**self).load()
    }

    fn store(&self, record: MailboxRecord) {
        (**self).store(record)
    }
}

impl<S: Signals + ?Sized> Signals for Arc<S> {
    fn wait(&self, index: usize) -> Result<()> {
        (**self).wait(index)
    }

    fn signal(&self, index: usize) -> Result<()> {
        (**self).signal(index)
    }

    fn peek(&self, index: usize) -> Result<i32> {
        (**self).peek(index)
    }
}

/// Positions of one worker's `ready` and `done` counters in a signal array
/// of `2 * n_proc` entries: `ready` in `[0, n_proc)`, `done` in
/// `[n_proc, 2 * n_proc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPair {
    pub ready: usize,
    pub done: usize,
}

impl SyncPair {
    pub fn for_worker(index: usize, n_proc: usize) -> SyncPair {
        SyncPair {
            ready: index,
            done: n_proc + index,
        }
    }

    pub fn wait_ready<S: Signals + ?Sized>(&self, signals: &S) -> Result<()> {
        signals.wait(self.ready)
    }

    pub fn signal_ready<S: Signals + ?Sized>(&self, signals: &S) -> Result<()> {
        signals.signal(self.ready)
    }

    pub fn wait_done<S: Signals + ?Sized>(&self, signals: &S) -> Result<()> {
        signals.wait(self.done)
    }

    pub fn signal_done<S: Signals + ?Sized>(&self, signals: &S) -> Result<()> {
        signals.signal(self.done)
    }

    pub fn peek_done<S: Signals + ?Sized>(&self, signals: &S) -> Result<i32> {
        signals.peek(self.done)
    }
}

/// Allocation and process/thread management for one kind of pool.
pub trait Backend {
    type Mailbox: Mailbox;
    type Signals: Signals;
    type Worker;

    fn name(&self) -> &'static str;

    /// Creates the mailbox of worker `index` (0-based).
    fn allocate_mailbox(&mut self, index: usize) -> Result<Self::Mailbox>;

    fn release_mailbox(&mut self, mailbox: Self::Mailbox) -> Result<()>;

    /// Creates the whole signal array in one step, every counter at 0.
    fn allocate_signals(&mut self, count: usize) -> Result<Self::Signals>;

    /// Removes the signal array. Workers still blocked on it are woken with
    /// an error.
    fn release_signals(&mut self, signals: Self::Signals) -> Result<()>;

    /// Starts worker `index`, running [`worker::run_worker`] on its mailbox
    /// and pair until it reads `TERMINATE`.
    fn spawn_worker(
        &mut self,
        index: usize,
        mailbox: &Self::Mailbox,
        signals: &Self::Signals,
        pair: SyncPair,
    ) -> Result<Self::Worker>;

    /// Blocks until worker `index` has exited.
    fn join_worker(&mut self, index: usize, worker: Self::Worker) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_pair_layout() {
        assert_eq!(SyncPair::for_worker(0, 3), SyncPair { ready: 0, done: 3 });
        assert_eq!(SyncPair::for_worker(2, 3), SyncPair { ready: 2, done: 5 });
    }
}
