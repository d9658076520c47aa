//! # Runtime memory layout
//!
//! [`MemoryLayout`] carries the constants of [`crate::memory`] as a value.
//! The kernel reads every boundary from it, never from the constants directly.

use crate::memory::{
    CONSOLE_ADDR, IO_HOLE_END, IO_HOLE_START, KERNEL_END_ADDR, KERNEL_STACK_TOP,
    KERNEL_START_ADDR, MEMSIZE_PHYSICAL, MEMSIZE_VIRTUAL, PROC_START_ADDR,
};
use core::ops::Range;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};

/// Physical and virtual layout of the machine.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    /// Bytes of physical memory; frames above are never allocated.
    pub physical_size: u64,
    /// Bytes of process virtual address space.
    pub virtual_size: u64,
    /// Boundary between the shared kernel region and process memory.
    pub proc_start: u64,
    /// Physical range of the kernel image.
    pub kernel_image: Range<u64>,
    /// Top of the kernel stack page.
    pub kernel_stack_top: u64,
    /// Hardware-owned physical range.
    pub io_hole: Range<u64>,
    /// Console page, user accessible in every process.
    pub console: u64,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            physical_size: MEMSIZE_PHYSICAL,
            virtual_size: MEMSIZE_VIRTUAL,
            proc_start: PROC_START_ADDR,
            kernel_image: KERNEL_START_ADDR..KERNEL_END_ADDR,
            kernel_stack_top: KERNEL_STACK_TOP,
            io_hole: IO_HOLE_START..IO_HOLE_END,
            console: CONSOLE_ADDR,
        }
    }
}

impl MemoryLayout {
    /// The default layout with a different amount of physical memory.
    ///
    /// The size is rounded down to whole pages and never shrinks below the
    /// process boundary, since the kernel region must stay backed.
    #[must_use]
    pub fn with_physical_size(physical_size: u64) -> Self {
        let base = Self::default();
        let size = kernel_memory_addresses::align_down(physical_size, PAGE_SIZE);
        Self {
            physical_size: size.max(base.proc_start),
            ..base
        }
    }

    /// Number of physical frames.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.physical_size / PAGE_SIZE
    }

    /// Base of the kernel stack page.
    #[must_use]
    pub const fn kernel_stack_page(&self) -> u64 {
        self.kernel_stack_top - PAGE_SIZE
    }

    /// Virtual address of the process stack page.
    #[must_use]
    pub const fn user_stack_page(&self) -> VirtualAddress {
        VirtualAddress::new(self.virtual_size - PAGE_SIZE)
    }

    /// Whether `va` lies in the per-process part of the address space.
    #[must_use]
    pub const fn is_user_address(&self, va: VirtualAddress) -> bool {
        va.as_u64() >= self.proc_start && va.as_u64() < self.virtual_size
    }

    /// Whether the frame containing `pa` may be handed out by the frame allocator.
    ///
    /// The null frame, the kernel image, the kernel stack page and the I/O hole
    /// are never allocatable, and neither is anything beyond physical memory.
    #[must_use]
    pub fn is_allocatable(&self, pa: PhysicalAddress) -> bool {
        let pa = pa.page().base().as_u64();
        if pa == 0 || pa >= self.physical_size {
            return false;
        }
        !(self.kernel_image.contains(&pa)
            || pa == self.kernel_stack_page()
            || self.io_hole.contains(&pa))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_frames_are_not_allocatable() {
        let layout = MemoryLayout::default();
        for pa in [0, 0x4_0000, 0x5_F000, 0x7_F000, 0xA_0000, 0xB_8000, 0xF_F000] {
            assert!(!layout.is_allocatable(PhysicalAddress::new(pa)), "{pa:#x}");
        }
        assert!(!layout.is_allocatable(PhysicalAddress::new(MEMSIZE_PHYSICAL)));
    }

    #[test]
    fn ordinary_frames_are_allocatable() {
        let layout = MemoryLayout::default();
        for pa in [0x1000, 0x3_F000, 0x6_0000, 0x8_0000, 0x10_0000, 0x1F_F123] {
            assert!(layout.is_allocatable(PhysicalAddress::new(pa)), "{pa:#x}");
        }
    }

    #[test]
    fn user_range_is_half_open() {
        let layout = MemoryLayout::default();
        assert!(!layout.is_user_address(VirtualAddress::new(PROC_START_ADDR - 1)));
        assert!(layout.is_user_address(VirtualAddress::new(PROC_START_ADDR)));
        assert!(layout.is_user_address(layout.user_stack_page()));
        assert!(!layout.is_user_address(VirtualAddress::new(MEMSIZE_VIRTUAL)));
    }

    #[test]
    fn shrunk_layout_keeps_the_kernel_region() {
        let layout = MemoryLayout::with_physical_size(0x12_3456);
        assert_eq!(layout.physical_size, 0x12_3000);
        assert_eq!(layout.frame_count(), 0x123);
        assert_eq!(MemoryLayout::with_physical_size(0).physical_size, PROC_START_ADDR);
    }
}
