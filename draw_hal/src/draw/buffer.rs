/// Buffer trait, usage flags and the write-range contract shared by all backends

use std::any::Any;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::RefCounted;

bitflags! {
    /// Buffer usage flags, fixed at creation
    ///
    /// Backends pick their storage class from these (e.g. DYNAMIC buffers
    /// live in host-visible memory).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX_DATA = 1;
        const INDEX_DATA = 2;
        const GENERIC = 4;
        const DYNAMIC = 16;
    }
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g. VulkanBuffer).
pub trait Buffer {
    /// Capacity in bytes
    fn size(&self) -> usize;

    /// Usage flags given at creation
    fn usage(&self) -> BufferUsage;

    /// Replace the whole contents
    ///
    /// Fails with `Error::SizeMismatch` unless `data.len() == self.size()`.
    fn write_full(&mut self, data: &[u8]) -> Result<()>;

    /// Write `data` starting at byte `offset`
    ///
    /// Fails with `Error::OutOfRange` (nothing written) if the write would
    /// run past the end of the buffer.
    fn write_partial(&mut self, data: &[u8], offset: usize) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

pub type BufferRef = RefCounted<dyn Buffer>;

/// Validate a full-buffer write
pub fn check_full_write(capacity: usize, size: usize) -> Result<()> {
    if size != capacity {
        return Err(Error::SizeMismatch {
            expected: capacity,
            actual: size,
        });
    }
    Ok(())
}

/// Validate a sub-range write
pub fn check_partial_write(capacity: usize, offset: usize, size: usize) -> Result<()> {
    match offset.checked_add(size) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(Error::OutOfRange {
            offset,
            size,
            capacity,
        }),
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
