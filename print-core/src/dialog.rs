use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DialogView {
    pub open: bool,
    pub epoch: u64,
    /// Last status line written by an export job.
    pub status: Option<String>,
}

/// Dialog-level state of the export dialog.
///
/// Opening or closing bumps the epoch. An export job takes a [`DialogTicket`]
/// when it starts; once the dialog has moved to another epoch the job's late
/// writes are dropped. The job itself keeps running to completion.
#[derive(Clone, Debug, Default)]
pub struct ExportDialog {
    inner: Rc<RefCell<DialogView>>,
}

impl ExportDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let mut v = self.inner.borrow_mut();
        v.epoch += 1;
        v.open = true;
        v.status = None;
    }

    /// Clears dialog state synchronously; in-flight work is not cancelled.
    pub fn close(&self) {
        let mut v = self.inner.borrow_mut();
        v.epoch += 1;
        v.open = false;
        v.status = None;
    }

    pub fn ticket(&self) -> DialogTicket {
        DialogTicket {
            epoch: self.inner.borrow().epoch,
            dialog: self.clone(),
        }
    }

    pub fn view(&self) -> DialogView {
        self.inner.borrow().clone()
    }
}

pub struct DialogTicket {
    epoch: u64,
    dialog: ExportDialog,
}

impl DialogTicket {
    /// Write `status` if the dialog is still the one this ticket was taken
    /// from. Returns whether the write happened.
    pub fn write(&self, status: impl Into<String>) -> bool {
        let mut v = self.dialog.inner.borrow_mut();
        if !v.open || v.epoch != self.epoch {
            log::debug!("export dialog closed; status update dropped");
            return false;
        }
        v.status = Some(status.into());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_write_after_close_is_dropped() {
        let d = ExportDialog::new();
        d.open();
        let t = d.ticket();
        assert!(t.write("capturing"));
        d.close();
        assert!(!t.write("done"));
        assert_eq!(d.view().status, None);
    }

    #[test]
    fn reopening_does_not_revive_an_old_ticket() {
        let d = ExportDialog::new();
        d.open();
        let old = d.ticket();
        d.close();
        d.open();
        assert!(!old.write("done"));
        assert!(d.ticket().write("done"));
        assert_eq!(d.view().status.as_deref(), Some("done"));
    }
}
