//! Open file handles on a roulette device.

use crate::core::{CopyOut, Session, UsageRef};
use crate::error::DeviceError;
use std::io;

/// One open handle: the session it owns and its read cursor.
///
/// Field order matters: on drop the usage reference is given back before
/// the session buffer is freed.
#[derive(Debug)]
pub struct OpenFile {
    usage: UsageRef,
    session: Session,
    pos: u64,
}

impl OpenFile {
    pub(super) const fn new(usage: UsageRef, session: Session) -> Self {
        Self {
            usage,
            session,
            pos: 0,
        }
    }

    /// Returns the session bound to this handle.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the cursor position.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.pos
    }

    /// Reads up to `len` bytes at the cursor into `dst`, advancing it.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Fault`] if `dst` rejects the copy; the cursor
    /// does not move.
    pub fn read_into<D>(&mut self, dst: &mut D, len: usize) -> Result<usize, DeviceError>
    where
        D: CopyOut + ?Sized,
    {
        self.session.read_at(dst, len, &mut self.pos)
    }

    /// Reads at a caller-held offset, leaving this handle's cursor alone.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Fault`] if `dst` rejects the copy.
    pub fn read_at<D>(&self, dst: &mut D, len: usize, offset: &mut u64) -> Result<usize, DeviceError>
    where
        D: CopyOut + ?Sized,
    {
        self.session.read_at(dst, len, offset)
    }

    /// Gives back the usage reference, then frees the session.
    pub(super) fn release(self) {
        let Self { usage, session, .. } = self;
        drop(usage);
        session.release();
    }
}

impl io::Read for OpenFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        self.read_into(buf, len).map_err(io::Error::from)
    }
}
