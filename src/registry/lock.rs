//! Single-writer lock over the registry directory
//!
//! An exclusive, non-blocking `flock(2)` on `<network_dir>/.lock`. The lock
//! lives as long as the [`WriterLock`] value and is released by the kernel
//! if the process dies.

use crate::error::{OverlayError, Result};
use nix::fcntl::{Flock, FlockArg};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Held exclusive lock on the registry directory
pub struct WriterLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl WriterLock {
    /// Try to take the lock without blocking
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, errno)) => {
                if errno != nix::errno::Errno::EWOULDBLOCK {
                    warn!("Unexpected flock error on {:?}: {}", path, errno);
                }
                return Err(OverlayError::RegistryLocked(format!("{:?}: {}", path, errno)));
            }
        };

        // Owner pid, informational only
        let mut owner: &File = &lock;
        let _ = owner.set_len(0);
        let _ = writeln!(owner, "{}", std::process::id());

        debug!("Acquired registry lock {:?}", path);
        Ok(Self { _lock: lock, path })
    }

    /// Lock file location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for WriterLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterLock").field("path", &self.path).finish()
    }
}
