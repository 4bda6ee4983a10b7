use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CompileError, Result};

/// Cooperative cancellation flag shared between a caller and a compile run.
///
/// Checked between sheets and between build targets, never mid-row.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once `cancel` has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CompileError::cancelled())
        } else {
            Ok(())
        }
    }
}
