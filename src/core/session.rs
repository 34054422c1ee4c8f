//! Per-open session state and the buffered read protocol.
//!
//! A [`Session`] is created when an open survives its sample and lives until
//! the matching release. Reads are positional: the caller owns the cursor and
//! passes it in, and [`Session::read_at`] advances it by exactly the number of
//! bytes delivered.

use crate::core::buffer::{MAX_BUFFER_SIZE, SessionBuffer};
use crate::error::DeviceError;

/// Destination for bytes copied out of a session.
///
/// This plays the role of a user-space buffer: the copy either lands in full
/// or fails with [`DeviceError::Fault`] and leaves no side effects.
pub trait CopyOut {
    /// Copies `src` into the destination.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Fault`] if the destination cannot accept `src`.
    fn copy_out(&mut self, src: &[u8]) -> Result<(), DeviceError>;
}

impl CopyOut for [u8] {
    fn copy_out(&mut self, src: &[u8]) -> Result<(), DeviceError> {
        let dst = self.get_mut(..src.len()).ok_or(DeviceError::Fault {
            requested: src.len(),
        })?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl CopyOut for Vec<u8> {
    fn copy_out(&mut self, src: &[u8]) -> Result<(), DeviceError> {
        self.extend_from_slice(src);
        Ok(())
    }
}

/// State bound to one open file handle.
///
/// # Examples
///
/// ```
/// use kernel_roulette::core::Session;
///
/// let session = Session::new(250, 200).unwrap();
/// let mut out = Vec::new();
/// let mut offset = 0;
/// let n = session.read_at(&mut out, 10, &mut offset).unwrap();
/// assert_eq!(n, 10);
/// assert_eq!(out, b"Survived..");
/// assert_eq!(offset, 10);
/// ```
#[derive(Debug)]
pub struct Session {
    buffer: SessionBuffer,
    sampled: u8,
    chance: u8,
}

impl Session {
    /// Allocates a session buffer and formats the status line into it.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AllocationFailed`] if the buffer cannot be
    /// allocated.
    pub fn new(sampled: u8, chance: u8) -> Result<Self, DeviceError> {
        let mut buffer = SessionBuffer::allocate(MAX_BUFFER_SIZE)?;
        buffer.write_formatted(sampled, chance);
        Ok(Self {
            buffer,
            sampled,
            chance,
        })
    }

    /// Returns the number of readable bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if the session has nothing to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the readable bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Returns the value sampled at open.
    #[must_use]
    pub const fn sampled(&self) -> u8 {
        self.sampled
    }

    /// Returns the chance in effect at open.
    #[must_use]
    pub const fn chance(&self) -> u8 {
        self.chance
    }

    /// Copies up to `requested` bytes starting at `*offset` into `dst`.
    ///
    /// Returns the number of bytes copied and advances `*offset` by the same
    /// amount. Zero means end-of-stream. Offsets past [`MAX_BUFFER_SIZE`] are
    /// end-of-stream without further checks; offsets between the readable
    /// length and the capacity also yield zero, since nothing remains there.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Fault`] if `dst` rejects the copy. The offset is
    /// left untouched in that case.
    pub fn read_at<D>(
        &self,
        dst: &mut D,
        requested: usize,
        offset: &mut u64,
    ) -> Result<usize, DeviceError>
    where
        D: CopyOut + ?Sized,
    {
        if *offset > MAX_BUFFER_SIZE as u64 {
            return Ok(0);
        }
        // Bounded by MAX_BUFFER_SIZE above.
        #[allow(clippy::cast_possible_truncation)]
        let start = *offset as usize;

        let remaining = self.len().saturating_sub(start);
        let to_copy = remaining.min(requested);
        if to_copy == 0 {
            return Ok(0);
        }

        dst.copy_out(&self.as_bytes()[start..start + to_copy])?;
        *offset += to_copy as u64;

        tracing::trace!(start, to_copy, "session read");
        Ok(to_copy)
    }

    /// Frees the buffer, then the session record.
    pub fn release(self) {
        let Self { buffer, .. } = self;
        buffer.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const MESSAGE: &[u8] = b"Survived... sampled value is 250, which is >= 200\n";

    fn session() -> Session {
        Session::new(250, 200).unwrap()
    }

    #[test]
    fn test_new_session() {
        let session = session();
        assert_eq!(session.len(), 50);
        assert_eq!(session.as_bytes(), MESSAGE);
        assert_eq!(session.sampled(), 250);
        assert_eq!(session.chance(), 200);
    }

    #[test]
    fn test_partial_reads_advance_cursor() {
        let session = session();
        let mut offset = 0;

        let mut first = Vec::new();
        assert_eq!(session.read_at(&mut first, 10, &mut offset).unwrap(), 10);
        assert_eq!(first, b"Survived..");
        assert_eq!(offset, 10);

        let mut rest = Vec::new();
        assert_eq!(session.read_at(&mut rest, 100, &mut offset).unwrap(), 40);
        assert_eq!(rest, &MESSAGE[10..]);
        assert_eq!(offset, 50);

        let mut tail = Vec::new();
        assert_eq!(session.read_at(&mut tail, 100, &mut offset).unwrap(), 0);
        assert!(tail.is_empty());
        assert_eq!(offset, 50);
    }

    #[test]
    fn test_end_of_stream_is_idempotent() {
        let session = session();
        let mut offset = 50;
        for _ in 0..5 {
            let mut out = Vec::new();
            assert_eq!(session.read_at(&mut out, 64, &mut offset).unwrap(), 0);
            assert_eq!(offset, 50);
        }
    }

    #[test_case(50 ; "exactly at length")]
    #[test_case(200 ; "between length and capacity")]
    #[test_case(256 ; "at capacity")]
    #[test_case(257 ; "just past capacity")]
    #[test_case(300 ; "far past capacity")]
    #[test_case(u64::MAX ; "maximum offset")]
    fn test_offsets_past_content_are_end_of_stream(start: u64) {
        let session = session();
        let mut offset = start;
        let mut out = Vec::new();
        assert_eq!(session.read_at(&mut out, 100, &mut offset).unwrap(), 0);
        assert!(out.is_empty());
        assert_eq!(offset, start);
    }

    #[test]
    fn test_zero_length_request() {
        let session = session();
        let mut offset = 0;
        let mut out = Vec::new();
        assert_eq!(session.read_at(&mut out, 0, &mut offset).unwrap(), 0);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_slice_destination() {
        let session = session();
        let mut offset = 40;
        let mut buf = [0u8; 32];
        let n = session.read_at(&mut buf[..], 32, &mut offset).unwrap();
        assert_eq!(n, 10);
        assert_eq!(&buf[..n], &MESSAGE[40..]);
        assert_eq!(offset, 50);
    }

    #[test]
    fn test_fault_leaves_offset_untouched() {
        let session = session();
        let mut offset = 5;
        let mut small = [0u8; 4];
        let err = session.read_at(&mut small[..], 20, &mut offset).unwrap_err();
        assert_eq!(err, DeviceError::Fault { requested: 20 });
        assert_eq!(offset, 5);
        assert_eq!(small, [0u8; 4]);
    }

    #[test]
    fn test_release() {
        session().release();
    }
}
