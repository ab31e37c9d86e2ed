//! The mount-health guard (spec §4.4): every public entry point other than
//! `read`/`write`/`close` re-runs `mount` first if `needs_remount` is set,
//! then rejects a still-open session; `read`/`write`/`close` instead refuse
//! outright while the flag is set, since their buffered block can't be
//! trusted.

use crate::{
    device::BlockDevice,
    error::{Error, Result},
    mount, Filesystem, Mode,
};

impl<'a, D: BlockDevice> Filesystem<'a, D> {
    pub(crate) fn directory_preamble(&mut self) -> Result<(), D::Error> {
        if self.needs_remount {
            self.remount()?;
        }
        if !matches!(self.mode, Mode::None) {
            let was_write = matches!(self.mode, Mode::Write { .. });
            self.mode = Mode::None;
            if was_write {
                self.needs_remount = true;
            }
            return Err(Error::WrongMode);
        }
        Ok(())
    }

    pub(crate) fn session_preamble(&self) -> Result<(), D::Error> {
        if self.needs_remount {
            return Err(Error::WrongMode);
        }
        Ok(())
    }

    pub(crate) fn remount(&mut self) -> Result<(), D::Error> {
        let state = mount::run(
            &mut self.device,
            self.block_buf,
            self.file_start,
            self.occupied,
            self.scratch1,
            self.scratch2,
            self.block_count,
        )?;
        self.youngest = state.youngest;
        self.file_count = state.file_count;
        self.needs_remount = false;
        Ok(())
    }
}
