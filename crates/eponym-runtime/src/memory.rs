//! Allocator bridge: buffers inside the guest's linear memory, obtained
//! through the guest's own exported allocator and always handed back.
//!
//! The guest owns its address space. The host never assumes a layout,
//! always allocates through the guest, and balances every allocate with
//! exactly one free — an unbalanced allocate leaks guest memory for the
//! life of the instance, and a double free corrupts the guest allocator's
//! bookkeeping.

use crate::error::RuntimeError;
use crate::module::ModuleState;

impl ModuleState {
    /// Request `size` bytes from the guest allocator.
    ///
    /// A returned pointer of zero is the "no buffer" sentinel for
    /// zero-length requests and must not be written through or freed.
    pub(crate) fn allocate(&mut self, size: u32) -> Result<u32, RuntimeError> {
        let ptr = self.call_alloc(size)?;
        if ptr == 0 {
            if size > 0 {
                return Err(RuntimeError::Alloc(format!(
                    "guest refused a {size}-byte allocation"
                )));
            }
            return Ok(0);
        }
        self.allocs += 1;
        Ok(ptr)
    }

    /// Return a buffer to the guest allocator. `(ptr, size)` must match a
    /// prior [`allocate`](Self::allocate).
    pub(crate) fn free(&mut self, ptr: u32, size: u32) -> Result<(), RuntimeError> {
        self.call_free(ptr, size)?;
        self.frees += 1;
        Ok(())
    }

    /// Write `bytes` at `ptr`, bounds-checked against the memory's
    /// *current* size (guest memory can grow between calls).
    pub(crate) fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), RuntimeError> {
        let data = self.memory.data_mut(&mut self.store);
        let size = data.len();
        let range = checked_range(ptr, bytes.len(), size)?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Read `len` bytes at `ptr`, bounds-checked against the current size.
    pub(crate) fn read(&mut self, ptr: u32, len: u32) -> Result<Vec<u8>, RuntimeError> {
        let data = self.memory.data(&self.store);
        let range = checked_range(ptr, len as usize, data.len())?;
        Ok(data[range].to_vec())
    }
}

fn checked_range(
    ptr: u32,
    len: usize,
    memory_size: usize,
) -> Result<std::ops::Range<usize>, RuntimeError> {
    let start = ptr as usize;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= memory_size)
        .ok_or_else(|| {
            RuntimeError::MemoryAccess(format!(
                "{len} bytes at offset {ptr} (memory is {memory_size} bytes)"
            ))
        })?;
    Ok(start..end)
}

/// Transient guest buffers for one façade call.
///
/// Records every non-sentinel allocation and releases them in reverse
/// allocation order. Frames are closed explicitly rather than on drop:
/// freeing needs `&mut ModuleState`, and the close outcome must be
/// observable so a trapped free is never silently swallowed.
pub(crate) struct AllocFrame {
    buffers: Vec<(u32, u32)>,
}

impl AllocFrame {
    pub(crate) fn new() -> Self {
        Self {
            buffers: Vec::new(),
        }
    }

    /// Allocate through the guest and record the buffer for release.
    pub(crate) fn allocate(
        &mut self,
        state: &mut ModuleState,
        size: u32,
    ) -> Result<u32, RuntimeError> {
        let ptr = state.allocate(size)?;
        if ptr != 0 {
            self.buffers.push((ptr, size));
        }
        Ok(ptr)
    }

    /// Free every recorded buffer, most recent first. All buffers are
    /// attempted even after a failure; the first error is reported.
    pub(crate) fn close(mut self, state: &mut ModuleState) -> Result<(), RuntimeError> {
        let mut first_err = None;
        while let Some((ptr, size)) = self.buffers.pop() {
            if let Err(e) = state.free(ptr, size) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
