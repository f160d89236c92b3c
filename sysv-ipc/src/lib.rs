// SPDX-License-Identifier: MIT

//! System V IPC building blocks: keys, shared memory segments and
//! semaphore sets.
//!
//! Every object created here is owned by the value that created it and is
//! removed from the system (`IPC_RMID`) when that value is released or
//! dropped. A process created with `fork` inherits the attachments of its
//! parent; it must leave with `_exit` so it never runs those destructors.

pub mod key;
pub mod sem;
pub mod shm;

pub use key::IpcKey;
pub use sem::SemaphoreSet;
pub use shm::SharedSegment;

/// Permission bits used for every object: read/write for the owner only.
pub const DEFAULT_MODE: libc::c_int = 0o600;
