// SPDX-License-Identifier: MIT

//! Process pool: System V shared memory mailboxes, one System V semaphore
//! set and one forked child per worker.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use log::{debug, error, info};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, getpid, getppid, ForkResult, Pid};
use sysv_ipc::{IpcKey, SemaphoreSet, SharedSegment, DEFAULT_MODE};

use super::{worker, Backend, Mailbox, MailboxRecord, Signals, SyncPair};
use crate::error::{CalcError, Result};

/// Project id of the semaphore set when keys are derived from a file.
const SEMAPHORE_PROJ_ID: u8 = b'a';

/// How IPC keys are chosen.
///
/// Only [`KeySpace::File`] derives each worker's key from its index; the
/// private default leaves nothing for another process to find.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeySpace {
    /// `IPC_PRIVATE` for every object. Forked workers inherit the
    /// attachments, so nothing needs to be looked up by key.
    #[default]
    Private,
    /// `ftok(path, index + 1)` for mailbox `index`, `ftok(path, 'a')` for the
    /// semaphore set. Objects are created exclusively.
    File(PathBuf),
}

impl KeySpace {
    pub fn mailbox_key(&self, index: usize) -> nix::Result<IpcKey> {
        match self {
            KeySpace::Private => Ok(IpcKey::PRIVATE),
            KeySpace::File(path) => {
                let proj_id = u8::try_from(index + 1).map_err(|_| Errno::ERANGE)?;
                IpcKey::from_path(path, proj_id)
            }
        }
    }

    pub fn semaphore_key(&self) -> nix::Result<IpcKey> {
        match self {
            KeySpace::Private => Ok(IpcKey::PRIVATE),
            KeySpace::File(path) => IpcKey::from_path(path, SEMAPHORE_PROJ_ID),
        }
    }
}

impl Mailbox for SharedSegment<MailboxRecord> {
    fn load(&self) -> MailboxRecord {
        self.read()
    }

    fn store(&self, record: MailboxRecord) {
        self.write(record)
    }
}

impl Signals for SemaphoreSet {
    fn wait(&self, index: usize) -> Result<()> {
        SemaphoreSet::wait(self, index)
            .map_err(|e| CalcError::resource(format!("wait on semaphore {index}"), e))
    }

    fn signal(&self, index: usize) -> Result<()> {
        SemaphoreSet::signal(self, index)
            .map_err(|e| CalcError::resource(format!("signal semaphore {index}"), e))
    }

    fn peek(&self, index: usize) -> Result<i32> {
        SemaphoreSet::peek(self, index)
            .map_err(|e| CalcError::resource(format!("read semaphore {index}"), e))
    }
}

#[derive(Debug, Default)]
pub struct ProcessBackend {
    keys: KeySpace,
}

impl ProcessBackend {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

impl Backend for ProcessBackend {
    type Mailbox = SharedSegment<MailboxRecord>;
    type Signals = SemaphoreSet;
    type Worker = Pid;

    fn name(&self) -> &'static str {
        "process"
    }

    fn allocate_mailbox(&mut self, index: usize) -> Result<Self::Mailbox> {
        let operation = format!("allocate mailbox {}", index + 1);
        let key = self
            .keys
            .mailbox_key(index)
            .map_err(|e| CalcError::resource(operation.as_str(), e))?;
        SharedSegment::create(key, DEFAULT_MODE, MailboxRecord::default())
            .map_err(|e| CalcError::resource(operation, e))
    }

    fn release_mailbox(&mut self, mailbox: Self::Mailbox) -> Result<()> {
        let id = mailbox.id();
        mailbox
            .release()
            .map_err(|e| CalcError::resource(format!("release shared segment {id}"), e))
    }

    fn allocate_signals(&mut self, count: usize) -> Result<Self::Signals> {
        let key = self
            .keys
            .semaphore_key()
            .map_err(|e| CalcError::resource("create semaphore set", e))?;
        SemaphoreSet::create(key, count, DEFAULT_MODE)
            .map_err(|e| CalcError::resource("create semaphore set", e))
    }

    fn release_signals(&mut self, signals: Self::Signals) -> Result<()> {
        let id = signals.id();
        signals
            .release()
            .map_err(|e| CalcError::resource(format!("remove semaphore set {id}"), e))
    }

    fn spawn_worker(
        &mut self,
        index: usize,
        mailbox: &Self::Mailbox,
        signals: &Self::Signals,
        pair: SyncPair,
    ) -> Result<Self::Worker> {
        // The child runs with a single thread, the one that called fork().
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                debug!("forked worker {} as pid {}", index + 1, child);
                Ok(child)
            }
            Ok(ForkResult::Child) => {
                info!(
                    "worker {} created: parent {} self {}",
                    index + 1,
                    getppid(),
                    getpid()
                );
                // Never unwind into the parent's stack: its destructors own
                // the IPC objects and the other workers.
                let status = match panic::catch_unwind(AssertUnwindSafe(|| {
                    worker::run_worker(index, mailbox, signals, pair)
                })) {
                    Ok(Ok(_)) => 0,
                    Ok(Err(e)) => {
                        error!("worker {} failed: {}", index + 1, e);
                        1
                    }
                    Err(_) => 101,
                };
                unsafe { libc::_exit(status) }
            }
            Err(e) => Err(CalcError::resource(format!("fork worker {}", index + 1), e)),
        }
    }

    fn join_worker(&mut self, index: usize, worker: Self::Worker) -> Result<()> {
        let status = loop {
            match waitpid(worker, None) {
                Ok(status) => break status,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    return Err(CalcError::resource(
                        format!("wait for worker {}", index + 1),
                        e,
                    ))
                }
            }
        };

        match status {
            WaitStatus::Exited(_, 0) => {
                debug!("worker {} (pid {}) exited", index + 1, worker);
                Ok(())
            }
            WaitStatus::Exited(_, code) => Err(CalcError::Protocol(format!(
                "worker {} exited with status {}",
                index + 1,
                code
            ))),
            WaitStatus::Signaled(_, signal, _) => Err(CalcError::Protocol(format!(
                "worker {} killed by signal {:?}",
                index + 1,
                signal
            ))),
            other => Err(CalcError::Protocol(format!(
                "worker {} stopped unexpectedly: {:?}",
                index + 1,
                other
            ))),
        }
    }
}
