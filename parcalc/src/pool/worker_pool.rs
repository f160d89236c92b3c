// SPDX-License-Identifier: MIT

use std::collections::VecDeque;

use log::{debug, info, warn};

use super::{Backend, SyncPair};
use crate::error::{CalcError, Result};

/// `n_proc` workers with their mailboxes and the shared signal array.
///
/// Created in one go by [`WorkerPool::start`]: every mailbox first, then the
/// signal array, then the workers. [`WorkerPool::join_all`] followed by
/// [`WorkerPool::close`] is the orderly end. Dropping a pool that was not
/// closed removes the signal array first, which makes blocked workers exit,
/// then reaps the workers and frees the mailboxes.
pub struct WorkerPool<B: Backend> {
    backend: B,
    n_proc: usize,
    mailboxes: Vec<B::Mailbox>,
    signals: Option<B::Signals>,
    workers: VecDeque<(usize, B::Worker)>,
}

impl<B: Backend> WorkerPool<B> {
    pub fn start(backend: B, n_proc: usize) -> Result<Self> {
        if n_proc == 0 {
            return Err(CalcError::config("worker pool", "at least one worker is required"));
        }
        let mut pool = WorkerPool {
            backend,
            n_proc,
            mailboxes: Vec::with_capacity(n_proc),
            signals: None,
            workers: VecDeque::with_capacity(n_proc),
        };

        for index in 0..n_proc {
            let mailbox = pool.backend.allocate_mailbox(index)?;
            pool.mailboxes.push(mailbox);
        }
        pool.signals = Some(pool.backend.allocate_signals(2 * n_proc)?);

        for index in 0..n_proc {
            let signals = pool.signals.as_ref().ok_or_else(closed)?;
            let worker = pool.backend.spawn_worker(
                index,
                &pool.mailboxes[index],
                signals,
                SyncPair::for_worker(index, n_proc),
            )?;
            pool.workers.push_back((index, worker));
        }
        info!("started {} workers ({} backend)", n_proc, pool.backend.name());
        Ok(pool)
    }

    pub fn n_proc(&self) -> usize {
        self.n_proc
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn mailbox(&self, index: usize) -> &B::Mailbox {
        &self.mailboxes[index]
    }

    pub fn signals(&self) -> Result<&B::Signals> {
        self.signals.as_ref().ok_or_else(closed)
    }

    pub fn sync_pair(&self, index: usize) -> SyncPair {
        SyncPair::for_worker(index, self.n_proc)
    }

    /// Blocks until every worker has exited. Each worker is reaped once.
    pub fn join_all(&mut self) -> Result<()> {
        while let Some((index, worker)) = self.workers.pop_front() {
            self.backend.join_worker(index, worker)?;
        }
        debug!("all workers exited");
        Ok(())
    }

    /// Removes the signal array and every mailbox.
    pub fn close(mut self) -> Result<()> {
        if !self.workers.is_empty() {
            return Err(CalcError::Protocol(format!(
                "closing the pool with {} workers still running",
                self.workers.len()
            )));
        }
        if let Some(signals) = self.signals.take() {
            self.backend.release_signals(signals)?;
        }
        while let Some(mailbox) = self.mailboxes.pop() {
            self.backend.release_mailbox(mailbox)?;
        }
        Ok(())
    }
}

fn closed() -> CalcError {
    CalcError::Protocol("worker pool already closed".to_string())
}

impl<B: Backend> Drop for WorkerPool<B> {
    fn drop(&mut self) {
        if self.signals.is_none() && self.workers.is_empty() && self.mailboxes.is_empty() {
            return;
        }
        warn!("tearing down the worker pool without an orderly shutdown");
        if let Some(signals) = self.signals.take() {
            if let Err(e) = self.backend.release_signals(signals) {
                warn!("{e}");
            }
        }
        for (index, worker) in self.workers.drain(..) {
            if let Err(e) = self.backend.join_worker(index, worker) {
                debug!("worker {} after teardown: {}", index + 1, e);
            }
        }
        for mailbox in self.mailboxes.drain(..) {
            if let Err(e) = self.backend.release_mailbox(mailbox) {
                warn!("{e}");
            }
        }
    }
}
