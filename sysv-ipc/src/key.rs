// SPDX-License-Identifier: MIT

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;

/// Key naming a System V IPC object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpcKey(libc::key_t);

impl IpcKey {
    /// `IPC_PRIVATE`: every `get` call creates a fresh, unnamed object.
    pub const PRIVATE: IpcKey = IpcKey(libc::IPC_PRIVATE);

    /// Derives a key from an existing file and a project id, like `ftok(3)`.
    ///
    /// Only the low 8 bits of `proj_id` are significant, so ids must be
    /// non-zero and distinct to give distinct keys for the same path.
    pub fn from_path(path: &Path, proj_id: u8) -> nix::Result<IpcKey> {
        let c_path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::EINVAL)?;
        let key = unsafe { libc::ftok(c_path.as_ptr(), proj_id as libc::c_int) };
        if key == -1 {
            return Err(Errno::last());
        }
        Ok(IpcKey(key))
    }

    pub fn is_private(&self) -> bool {
        self.0 == libc::IPC_PRIVATE
    }

    pub fn raw(&self) -> libc::key_t {
        self.0
    }

    /// Creation flags for `shmget`/`semget`. Named keys are created
    /// exclusively so a collision with an existing object is reported.
    pub(crate) fn create_flags(&self, mode: libc::c_int) -> libc::c_int {
        if self.is_private() {
            libc::IPC_CREAT | mode
        } else {
            libc::IPC_CREAT | libc::IPC_EXCL | mode
        }
    }
}

impl std::fmt::Display for IpcKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_private() {
            write!(f, "IPC_PRIVATE")
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}
