//! Reference-counted physical frame table.
//!
//! One counter per frame of physical memory. A frame is free exactly when
//! its counter is zero; reserved frames (see
//! [`MemoryLayout::is_allocatable`]) are never handed out and can neither be
//! retained nor released.

use alloc::vec::Vec;
use kernel_info::layout::MemoryLayout;
use kernel_memory_addresses::PhysicalPage;
use kernel_vmem::FrameError;

/// Accounting state of one frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameInfo {
    pub page: PhysicalPage,
    pub refcount: u32,
    /// Never managed by the allocator (kernel image, I/O hole, null frame).
    pub reserved: bool,
}

/// First-fit allocator over per-frame reference counts.
pub struct FrameTable {
    refcounts: Vec<u32>,
    allocatable: Vec<bool>,
}

impl FrameTable {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(layout: &MemoryLayout) -> Self {
        let count = layout.frame_count() as usize;
        let allocatable = (0..count as u64)
            .map(|i| layout.is_allocatable(PhysicalPage::from_index(i).base()))
            .collect();
        Self {
            refcounts: alloc::vec![0; count],
            allocatable,
        }
    }

    /// Total number of frames, reserved ones included.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.refcounts.len()
    }

    /// Number of allocatable frames with a reference count of zero.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.refcounts
            .iter()
            .zip(&self.allocatable)
            .filter(|&(&count, &ok)| ok && count == 0)
            .count()
    }

    /// Current reference count of `page`; zero for frames outside memory.
    #[must_use]
    pub fn refcount(&self, page: PhysicalPage) -> u32 {
        self.slot(page).map_or(0, |i| self.refcounts[i])
    }

    #[must_use]
    pub fn is_allocatable(&self, page: PhysicalPage) -> bool {
        self.slot(page).is_some_and(|i| self.allocatable[i])
    }

    /// Claim the lowest free frame, setting its count to one.
    pub fn allocate(&mut self) -> Option<PhysicalPage> {
        let index = self
            .refcounts
            .iter()
            .zip(&self.allocatable)
            .position(|(&count, &ok)| ok && count == 0)?;
        self.refcounts[index] = 1;
        Some(PhysicalPage::from_index(index as u64))
    }

    /// Add a reference to an allocated frame and return the new count.
    ///
    /// # Errors
    /// - [`FrameError::NotAllocatable`] for reserved frames or frames outside memory.
    /// - [`FrameError::NotAllocated`] if the frame is free.
    /// - [`FrameError::RefcountOverflow`] if the counter is saturated.
    pub fn retain(&mut self, page: PhysicalPage) -> Result<u32, FrameError> {
        let index = self.managed_slot(page)?;
        let count = &mut self.refcounts[index];
        if *count == 0 {
            return Err(FrameError::NotAllocated(page.base()));
        }
        *count = count
            .checked_add(1)
            .ok_or(FrameError::RefcountOverflow(page.base()))?;
        Ok(*count)
    }

    /// Drop a reference and return the remaining count.
    ///
    /// Releasing the null frame does nothing.
    ///
    /// # Errors
    /// - [`FrameError::NotAllocatable`] for reserved frames or frames outside memory.
    /// - [`FrameError::NotAllocated`] if the count already is zero; the counter
    ///   is left untouched.
    pub fn release(&mut self, page: PhysicalPage) -> Result<u32, FrameError> {
        if page.base().is_null() {
            return Ok(0);
        }
        let index = self.managed_slot(page)?;
        let count = &mut self.refcounts[index];
        *count = count
            .checked_sub(1)
            .ok_or(FrameError::NotAllocated(page.base()))?;
        Ok(*count)
    }

    /// Accounting state of every frame, in address order.
    pub fn iter(&self) -> impl Iterator<Item = FrameInfo> + '_ {
        self.refcounts
            .iter()
            .zip(&self.allocatable)
            .enumerate()
            .map(|(i, (&refcount, &ok))| FrameInfo {
                page: PhysicalPage::from_index(i as u64),
                refcount,
                reserved: !ok,
            })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn slot(&self, page: PhysicalPage) -> Option<usize> {
        let index = page.index() as usize;
        (index < self.refcounts.len()).then_some(index)
    }

    fn managed_slot(&self, page: PhysicalPage) -> Result<usize, FrameError> {
        self.slot(page)
            .filter(|&i| self.allocatable[i])
            .ok_or(FrameError::NotAllocatable(page.base()))
    }
}
