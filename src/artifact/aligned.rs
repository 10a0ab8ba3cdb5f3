use std::{
    alloc::{self, Layout},
    fmt,
    ops::Deref,
    ptr::{self, NonNull},
};

use tracing::debug;

use crate::error::ServiceError;

/// Owned heap block whose start address is a multiple of `alignment`.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// SAFETY: the buffer exclusively owns its allocation and exposes it only
// through `&[u8]`.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Copies `bytes` into a fresh allocation aligned to `alignment`.
    ///
    /// `alignment` must be a non-zero power of two.
    pub fn from_bytes(bytes: &[u8], alignment: usize) -> Result<Self, ServiceError> {
        let len = bytes.len();
        debug!(size = len, alignment, "constructing aligned memory");

        // A zero-sized layout cannot be allocated, so empty buffers still
        // reserve one byte.
        let layout = Layout::from_size_align(len.max(1), alignment).map_err(|e| {
            ServiceError::Allocation(format!("{len} bytes at alignment {alignment}: {e}"))
        })?;

        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };

        // SAFETY: the destination was just allocated with room for `len`
        // bytes and cannot overlap `bytes`.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), len) };

        Ok(Self { ptr, len, layout })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the first `len` bytes were initialized in `from_bytes`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `from_bytes` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .field("alignment", &self.layout.align())
            .finish()
    }
}
