use crate::TableLevel;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Violations of the frame reference-count protocol.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// The frame's reference count is already zero.
    #[error("frame {0} is not allocated")]
    NotAllocated(PhysicalAddress),
    /// The frame is reserved or lies outside physical memory.
    #[error("frame {0} is not managed by the frame allocator")]
    NotAllocatable(PhysicalAddress),
    #[error("reference count of frame {0} overflowed")]
    RefcountOverflow(PhysicalAddress),
}

/// Failure to install a mapping.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    /// A missing intermediate table could not be allocated.
    ///
    /// Levels allocated before the failure stay linked into the address space.
    #[error("out of memory allocating a {level} table while mapping {va}")]
    OutOfMemory { va: VirtualAddress, level: TableLevel },
}
