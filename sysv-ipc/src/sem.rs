// SPDX-License-Identifier: MIT

use log::{debug, warn};
use nix::errno::Errno;

use crate::key::IpcKey;

/// A System V semaphore set with `len` counters, all starting at 0.
///
/// Handles are plain ids, so a forked child can use the set its parent
/// created. The set is removed on [`SemaphoreSet::release`] or drop; a
/// process blocked in [`SemaphoreSet::wait`] at that moment gets `EIDRM`.
#[derive(Debug)]
pub struct SemaphoreSet {
    semid: libc::c_int,
    len: usize,
    removed: bool,
}

impl SemaphoreSet {
    /// Creates the whole set in one call and zeroes every counter.
    pub fn create(key: IpcKey, len: usize, mode: libc::c_int) -> nix::Result<Self> {
        if len == 0 || len > libc::c_ushort::MAX as usize + 1 {
            return Err(Errno::EINVAL);
        }
        let semid = Errno::result(unsafe {
            libc::semget(key.raw(), len as libc::c_int, key.create_flags(mode))
        })?;
        let set = Self {
            semid,
            len,
            removed: false,
        };

        let mut zeroes: Vec<libc::c_ushort> = vec![0; len];
        Errno::result(unsafe { libc::semctl(semid, 0, libc::SETALL, zeroes.as_mut_ptr()) })?;
        debug!("created semaphore set {} (key {}, {} counters)", semid, key, len);
        Ok(set)
    }

    pub fn id(&self) -> libc::c_int {
        self.semid
    }

    /// P operation: blocks until counter `index` is positive, then
    /// decrements it. Interrupted calls are restarted.
    pub fn wait(&self, index: usize) -> nix::Result<()> {
        self.op(index, -1)
    }

    /// V operation: increments counter `index`.
    pub fn signal(&self, index: usize) -> nix::Result<()> {
        self.op(index, 1)
    }

    /// Current value of counter `index`, without touching it.
    pub fn peek(&self, index: usize) -> nix::Result<i32> {
        self.check(index)?;
        let value =
            Errno::result(unsafe { libc::semctl(self.semid, index as libc::c_int, libc::GETVAL) })?;
        Ok(value)
    }

    /// Removes the set from the system.
    pub fn release(mut self) -> nix::Result<()> {
        self.remove()
    }

    fn op(&self, index: usize, delta: libc::c_short) -> nix::Result<()> {
        self.check(index)?;
        let mut sop = libc::sembuf {
            sem_num: index as libc::c_ushort,
            sem_op: delta,
            sem_flg: 0,
        };
        loop {
            match Errno::result(unsafe { libc::semop(self.semid, &mut sop, 1) }) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn check(&self, index: usize) -> nix::Result<()> {
        if index >= self.len {
            return Err(Errno::EINVAL);
        }
        Ok(())
    }

    fn remove(&mut self) -> nix::Result<()> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;
        Errno::result(unsafe { libc::semctl(self.semid, 0, libc::IPC_RMID) })?;
        debug!("removed semaphore set {}", self.semid);
        Ok(())
    }
}

impl Drop for SemaphoreSet {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("failed to remove semaphore set {}: {}", self.semid, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_MODE;
    use std::thread;
    use std::time::Duration;

    fn private_set(len: usize) -> SemaphoreSet {
        SemaphoreSet::create(IpcKey::PRIVATE, len, DEFAULT_MODE).unwrap()
    }

    #[test]
    fn counters_start_at_zero() {
        let set = private_set(4);
        for i in 0..4 {
            assert_eq!(set.peek(i).unwrap(), 0);
        }
    }

    #[test]
    fn signal_then_wait_round_trips_the_counter() {
        let set = private_set(2);
        set.signal(1).unwrap();
        assert_eq!(set.peek(0).unwrap(), 0);
        assert_eq!(set.peek(1).unwrap(), 1);
        set.wait(1).unwrap();
        assert_eq!(set.peek(1).unwrap(), 0);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let set = private_set(2);
        assert_eq!(set.signal(2).unwrap_err(), Errno::EINVAL);
        assert_eq!(set.peek(7).unwrap_err(), Errno::EINVAL);
    }

    #[test]
    fn empty_set_is_rejected() {
        let err = SemaphoreSet::create(IpcKey::PRIVATE, 0, DEFAULT_MODE).unwrap_err();
        assert_eq!(err, Errno::EINVAL);
    }

    #[test]
    fn wait_blocks_until_signalled_from_another_thread() {
        let set = std::sync::Arc::new(private_set(1));
        let signaller = {
            let set = set.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                set.signal(0).unwrap();
            })
        };
        set.wait(0).unwrap();
        signaller.join().unwrap();
        assert_eq!(set.peek(0).unwrap(), 0);
    }

    #[test]
    fn named_key_collision_is_reported() {
        let dir = std::env::temp_dir();
        // Pick a proj id unlikely to be used by other tests.
        let key = IpcKey::from_path(&dir, 0xee).unwrap();
        let first = SemaphoreSet::create(key, 1, DEFAULT_MODE).unwrap();
        let second = SemaphoreSet::create(key, 1, DEFAULT_MODE).unwrap_err();
        assert_eq!(second, Errno::EEXIST);
        first.release().unwrap();
    }
}
