//! Guard that keeps a project read-only while a simulation runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{AppError, AppResult};

/// Shared run flag of one open project. Clones share the flag.
///
/// Reads are always served; writes are refused with [`AppError::Busy`] while
/// a [`RunGuard`] is alive.
#[derive(Clone, Debug, Default)]
pub struct ProjectLock {
    running: Arc<AtomicBool>,
}

impl ProjectLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the project for a run. Only one run at a time.
    pub fn acquire(&self) -> AppResult<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Busy)?;
        Ok(RunGuard {
            running: self.running.clone(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn ensure_writable(&self) -> AppResult<()> {
        if self.is_running() {
            Err(AppError::Busy)
        } else {
            Ok(())
        }
    }
}

/// Held for the duration of a run; releases the project on drop.
#[derive(Debug)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
