use std::cell::Cell;
use std::rc::Rc;

use crate::error::ExportError;

/// The shared "capturing" flag. One export job at a time may hold it; the
/// export control is disabled while it is set.
#[derive(Clone, Debug, Default)]
pub struct CaptureFlag(Rc<Cell<bool>>);

impl CaptureFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.0.get()
    }

    /// Set the flag for the lifetime of the returned guard.
    pub fn try_begin(&self) -> Result<CaptureGuard, ExportError> {
        if self.0.replace(true) {
            return Err(ExportError::Busy);
        }
        Ok(CaptureGuard(self.0.clone()))
    }
}

/// Clears the flag when dropped, on success, error and early return alike.
#[derive(Debug)]
pub struct CaptureGuard(Rc<Cell<bool>>);

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_busy_until_guard_drops() {
        let flag = CaptureFlag::new();
        let guard = flag.try_begin().unwrap();
        assert!(flag.is_capturing());
        assert!(matches!(flag.clone().try_begin(), Err(ExportError::Busy)));
        // the refused attempt must not clear the flag
        assert!(flag.is_capturing());
        drop(guard);
        assert!(!flag.is_capturing());
        assert!(flag.try_begin().is_ok());
    }
}
