//! Fixed-capacity session buffers.
//!
//! Every open session owns exactly one [`SessionBuffer`]: a zeroed
//! allocation of [`MAX_BUFFER_SIZE`] bytes holding the formatted status
//! line, plus the number of meaningful bytes in it.

use crate::error::DeviceError;
use std::fmt::{self, Write};

/// Capacity of every session buffer in bytes.
pub const MAX_BUFFER_SIZE: usize = 256;

/// Formats the status line reported by a surviving open.
///
/// # Examples
///
/// ```
/// use kernel_roulette::core::format_status;
///
/// assert_eq!(
///     format_status(250, 200),
///     "Survived... sampled value is 250, which is >= 200\n"
/// );
/// ```
#[must_use]
pub fn format_status(sampled: u8, chance: u8) -> String {
    format!("Survived... sampled value is {sampled}, which is >= {chance}\n")
}

/// Length of the NUL-terminated prefix of `bytes`, looking at most `max` bytes.
#[must_use]
pub fn strnlen(bytes: &[u8], max: usize) -> usize {
    let limit = max.min(bytes.len());
    bytes[..limit]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(limit)
}

/// A fixed-capacity byte buffer and the logical length of its contents.
///
/// Sessions never resize their buffer; [`SessionBuffer::try_resize`] exists
/// for callers that manage buffers of their own.
/// Content is written with C `snprintf` semantics: at most `capacity - 1`
/// bytes of text followed by a terminating NUL, so the logical length is
/// always strictly below the capacity.
///
/// # Examples
///
/// ```
/// use kernel_roulette::core::{SessionBuffer, MAX_BUFFER_SIZE};
///
/// let mut buffer = SessionBuffer::allocate(MAX_BUFFER_SIZE).unwrap();
/// let len = buffer.write_formatted(250, 200);
/// assert_eq!(len, 50);
/// assert!(buffer.as_bytes().starts_with(b"Survived..."));
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct SessionBuffer {
    data: Box<[u8]>,
    length: usize,
}

impl SessionBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AllocationFailed`] if the allocator refuses the
    /// request.
    pub fn allocate(capacity: usize) -> Result<Self, DeviceError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| DeviceError::AllocationFailed { size: capacity })?;
        data.resize(capacity, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
            length: 0,
        })
    }

    /// Writes the status line for `sampled` and `chance` into the buffer.
    ///
    /// Returns the resulting logical length.
    pub fn write_formatted(&mut self, sampled: u8, chance: u8) -> usize {
        self.write_args(format_args!(
            "Survived... sampled value is {sampled}, which is >= {chance}\n"
        ))
    }

    /// Writes arbitrary formatted text, truncating to fit the capacity.
    ///
    /// The previous contents are cleared first. The returned length is
    /// measured with [`strnlen`] over the whole allocation, so text with an
    /// embedded NUL reports only the bytes before it.
    pub fn write_args(&mut self, args: fmt::Arguments<'_>) -> usize {
        self.data.fill(0);
        let mut writer = TruncatingWriter {
            buf: &mut self.data,
            pos: 0,
        };
        // Truncation is not an error; the writer never reports one.
        let _ = writer.write_fmt(args);
        self.length = strnlen(&self.data, self.data.len());
        self.length
    }

    /// Returns the meaningful bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Returns the whole allocation, including bytes past the logical length.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    /// Returns the logical length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the allocation size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Resizes the allocation to `capacity` bytes, keeping existing text.
    ///
    /// New bytes are zeroed. Shrinking below the text truncates it and keeps
    /// the final byte as the terminator, so the length stays below the
    /// capacity.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AllocationFailed`] if growing fails; the buffer
    /// is left unchanged.
    pub fn try_resize(&mut self, capacity: usize) -> Result<(), DeviceError> {
        let mut data = std::mem::take(&mut self.data).into_vec();
        if let Some(extra) = capacity.checked_sub(data.len())
            && data.try_reserve_exact(extra).is_err()
        {
            self.data = data.into_boxed_slice();
            return Err(DeviceError::AllocationFailed { size: capacity });
        }
        data.resize(capacity, 0);
        if self.length >= capacity
            && let Some(last) = data.last_mut()
        {
            *last = 0;
        }

        self.data = data.into_boxed_slice();
        self.length = strnlen(&self.data, self.data.len());
        Ok(())
    }

    /// Returns the allocation to the allocator.
    pub fn release(self) {
        drop(self);
    }
}

/// `fmt::Write` sink that silently drops whatever does not fit.
struct TruncatingWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Write for TruncatingWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Keep the final byte for the terminator.
        let limit = self.buf.len().saturating_sub(1);
        let available = limit.saturating_sub(self.pos);
        let take = s.len().min(available);
        self.buf[self.pos..self.pos + take].copy_from_slice(&s.as_bytes()[..take]);
        self.pos += take;
        Ok(())
    }
}
