// SPDX-License-Identifier: MIT

use std::marker::PhantomData;
use std::ptr;

use log::{debug, warn};
use nix::errno::Errno;

use crate::key::IpcKey;

/// A System V shared memory segment holding exactly one `T`.
///
/// The segment is created and attached by [`SharedSegment::create`] and
/// detached and removed by [`SharedSegment::release`] (or on drop). The
/// attachment survives `fork`, so a child sees the same memory as its parent.
///
/// Accesses are volatile whole-record copies. The type does no locking: the
/// processes sharing it must agree on who may write at any given time.
#[derive(Debug)]
pub struct SharedSegment<T: Copy> {
    shmid: libc::c_int,
    addr: *mut T,
    _marker: PhantomData<T>,
}

impl<T: Copy> SharedSegment<T> {
    /// Creates a segment of `size_of::<T>()` bytes, attaches it and stores
    /// `initial` into it.
    pub fn create(key: IpcKey, mode: libc::c_int, initial: T) -> nix::Result<Self> {
        let size = std::mem::size_of::<T>();
        let shmid = Errno::result(unsafe { libc::shmget(key.raw(), size, key.create_flags(mode)) })?;

        let addr = unsafe { libc::shmat(shmid, ptr::null(), 0) };
        if addr as isize == -1 {
            let err = Errno::last();
            unsafe { libc::shmctl(shmid, libc::IPC_RMID, ptr::null_mut()) };
            return Err(err);
        }
        debug!("created shared segment {} (key {}, {} bytes)", shmid, key, size);

        let segment = Self {
            shmid,
            addr: addr as *mut T,
            _marker: PhantomData,
        };
        segment.write(initial);
        Ok(segment)
    }

    pub fn id(&self) -> libc::c_int {
        self.shmid
    }

    pub fn read(&self) -> T {
        unsafe { ptr::read_volatile(self.addr) }
    }

    pub fn write(&self, value: T) {
        unsafe { ptr::write_volatile(self.addr, value) }
    }

    /// Detaches the segment and removes it from the system.
    pub fn release(mut self) -> nix::Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> nix::Result<()> {
        if self.addr.is_null() {
            return Ok(());
        }
        let addr = std::mem::replace(&mut self.addr, ptr::null_mut());
        let detached = Errno::result(unsafe { libc::shmdt(addr as *const libc::c_void) });
        let removed =
            Errno::result(unsafe { libc::shmctl(self.shmid, libc::IPC_RMID, ptr::null_mut()) });
        debug!("removed shared segment {}", self.shmid);
        detached?;
        removed.map(drop)
    }
}

impl<T: Copy> Drop for SharedSegment<T> {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("failed to remove shared segment {}: {}", self.shmid, e);
        }
    }
}
