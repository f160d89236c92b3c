// SPDX-License-Identifier: MIT

//! In-process pool: workers are threads, mailboxes are mutex-guarded
//! records and the signal array is a set of `Mutex`/`Condvar` counters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::debug;
use nix::errno::Errno;

use super::{worker, Backend, Mailbox, MailboxRecord, Signals, SyncPair};
use crate::error::{CalcError, Result};

#[derive(Debug, Default)]
pub struct LocalMailbox {
    record: Mutex<MailboxRecord>,
}

impl LocalMailbox {
    fn lock(&self) -> MutexGuard<'_, MailboxRecord> {
        // A poisoned record is still a plain value; keep using it.
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Mailbox for LocalMailbox {
    fn load(&self) -> MailboxRecord {
        *self.lock()
    }

    fn store(&self, record: MailboxRecord) {
        *self.lock() = record;
    }
}

#[derive(Debug, Default)]
struct Counter {
    value: Mutex<i32>,
    changed: Condvar,
}

/// Counting semaphores. After [`LocalSemaphores::close`] every pending and
/// future `wait` fails, the way a removed System V set fails with `EIDRM`.
#[derive(Debug)]
pub struct LocalSemaphores {
    counters: Vec<Counter>,
    closed: AtomicBool,
}

impl LocalSemaphores {
    pub fn new(len: usize) -> Self {
        Self {
            counters: (0..len).map(|_| Counter::default()).collect(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for counter in &self.counters {
            // Taking the lock orders the flag before any waiter's re-check.
            let _guard = counter.value.lock().unwrap_or_else(|e| e.into_inner());
            counter.changed.notify_all();
        }
    }

    fn counter(&self, index: usize) -> Result<&Counter> {
        self.counters
            .get(index)
            .ok_or_else(|| CalcError::resource(format!("semaphore {index}"), Errno::EINVAL))
    }

    fn check_open(&self, operation: &str, index: usize) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CalcError::resource(
                format!("{operation} semaphore {index}"),
                Errno::EIDRM,
            ));
        }
        Ok(())
    }
}

impl Signals for LocalSemaphores {
    fn wait(&self, index: usize) -> Result<()> {
        let counter = self.counter(index)?;
        let mut value = counter.value.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            self.check_open("wait on", index)?;
            if *value > 0 {
                *value -= 1;
                return Ok(());
            }
            value = counter
                .changed
                .wait(value)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    fn signal(&self, index: usize) -> Result<()> {
        let counter = self.counter(index)?;
        let mut value = counter.value.lock().unwrap_or_else(|e| e.into_inner());
        self.check_open("signal", index)?;
        *value += 1;
        counter.changed.notify_one();
        Ok(())
    }

    fn peek(&self, index: usize) -> Result<i32> {
        let counter = self.counter(index)?;
        let value = counter.value.lock().unwrap_or_else(|e| e.into_inner());
        self.check_open("read", index)?;
        Ok(*value)
    }
}

/// Runs every worker as a named thread of the current process.
#[derive(Debug, Default)]
pub struct ThreadBackend;

impl ThreadBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for ThreadBackend {
    type Mailbox = Arc<LocalMailbox>;
    type Signals = Arc<LocalSemaphores>;
    type Worker = JoinHandle<Result<usize>>;

    fn name(&self) -> &'static str {
        "thread"
    }

    fn allocate_mailbox(&mut self, _index: usize) -> Result<Self::Mailbox> {
        Ok(Arc::new(LocalMailbox::default()))
    }

    fn release_mailbox(&mut self, _mailbox: Self::Mailbox) -> Result<()> {
        Ok(())
    }

    fn allocate_signals(&mut self, count: usize) -> Result<Self::Signals> {
        Ok(Arc::new(LocalSemaphores::new(count)))
    }

    fn release_signals(&mut self, signals: Self::Signals) -> Result<()> {
        signals.close();
        Ok(())
    }

    fn spawn_worker(
        &mut self,
        index: usize,
        mailbox: &Self::Mailbox,
        signals: &Self::Signals,
        pair: SyncPair,
    ) -> Result<Self::Worker> {
        let (mailbox, signals) = (mailbox.clone(), signals.clone());
        let handle = thread::Builder::new()
            .name(format!("worker-{}", index + 1))
            .spawn(move || {
                debug!("worker {} started on its own thread", index + 1);
                worker::run_worker(index, &mailbox, &signals, pair)
            })
            .map_err(|e| CalcError::resource(format!("spawn worker {}", index + 1), e))?;
        Ok(handle)
    }

    fn join_worker(&mut self, index: usize, worker: Self::Worker) -> Result<()> {
        match worker.join() {
            Ok(result) => result.map(drop),
            Err(_) => Err(CalcError::Protocol(format!(
                "worker {} panicked",
                index + 1
            ))),
        }
    }
}
