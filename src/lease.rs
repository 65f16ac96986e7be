//! Single-instance enforcement for the scheduler process.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// An exclusive lease on "being the scheduler" for this installation.
///
/// The file-backed implementation is the only one today; a distributed
/// lock can stand in for it when the worker runs on several hosts.
pub trait InstanceLease: Send {
    /// Try to take the lease. `Ok(false)` means another live holder exists.
    fn acquire(&mut self) -> Result<bool>;

    /// Give the lease up. Releasing a lease that is not held is a no-op.
    fn release(&mut self) -> Result<()>;

    /// Whether the recorded holder is still alive.
    fn holder_alive(&self) -> Result<bool>;
}

/// Lease backed by a lock file that stores the holder's process id.
pub struct PidFileLease {
    path: PathBuf,
    pid: u32,
    held: bool,
}

impl PidFileLease {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_pid(path, std::process::id())
    }

    pub fn with_pid(path: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            path: path.into(),
            pid,
            held: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    fn read_holder(&self) -> Result<Option<u32>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Lease(format!(
                    "failed to read lock file {}: {e}",
                    self.path.display()
                )))
            }
        };

        match content.trim().parse::<u32>() {
            Ok(pid) => Ok(Some(pid)),
            Err(_) => {
                tracing::warn!(
                    "ignoring malformed lock file at {}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    fn write_holder(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Lease(format!("failed to create lock directory: {e}"))
            })?;
        }

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, self.pid.to_string())
            .map_err(|e| AppError::Lease(format!("failed to write lock temp file: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| AppError::Lease(format!("failed to finalize lock file: {e}")))?;
        Ok(())
    }
}

impl InstanceLease for PidFileLease {
    fn acquire(&mut self) -> Result<bool> {
        if let Some(holder) = self.read_holder()? {
            if holder != self.pid && process_alive(holder) {
                tracing::debug!("process with PID {holder} already holds the scheduler lock");
                return Ok(false);
            }
            tracing::debug!("clearing stale scheduler lock left by PID {holder}");
        }

        self.write_holder()?;
        self.held = true;
        tracing::debug!("scheduler lock created with PID {}", self.pid);
        Ok(true)
    }

    fn release(&mut self) -> Result<()> {
        if !self.held {
            return Ok(());
        }

        // Only remove the file if it is still ours.
        if self.read_holder()? == Some(self.pid) {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::Lease(format!("failed to remove lock file: {e}")))
                }
            }
            tracing::debug!("scheduler lock removed");
        }
        self.held = false;
        Ok(())
    }

    fn holder_alive(&self) -> Result<bool> {
        Ok(self.read_holder()?.is_some_and(process_alive))
    }
}

impl Drop for PidFileLease {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("failed to release scheduler lock on drop: {e}");
        }
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 only checks for existence; EPERM still means the process exists.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(pid: u32) -> bool {
    pid == std::process::id()
}
