//! # Simulated physical memory
//!
//! [`PhysicalMemory`] owns the bytes of every physical frame together with
//! the [`FrameTable`] that accounts for them. It is the one object the
//! kernel's mapper and loader operate on: it hands out frames
//! ([`FrameAlloc`]) and gives byte access to them ([`PhysMapper`]).
//!
//! Freshly allocated frames are filled with [`ALLOC_FILL`] so that code
//! reading memory it never initialized is easy to spot.

use crate::frame_alloc::FrameTable;
use alloc::vec::Vec;
use kernel_info::layout::MemoryLayout;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use kernel_vmem::{FRAME_SIZE, Frame, FrameAlloc, FrameError, PhysMapper};
use log::trace;

/// Byte pattern written into every newly allocated frame.
pub const ALLOC_FILL: u8 = 0xCC;

/// Physical frames plus their reference counts.
pub struct PhysicalMemory {
    frames: Vec<Frame>,
    table: FrameTable,
}

impl PhysicalMemory {
    /// Zeroed memory for `layout`, with every frame free.
    #[must_use]
    pub fn new(layout: &MemoryLayout) -> Self {
        let table = FrameTable::new(layout);
        Self {
            frames: alloc::vec![[0u8; FRAME_SIZE]; table.frame_count()],
            table,
        }
    }

    /// The reference-count table.
    #[must_use]
    pub const fn frames(&self) -> &FrameTable {
        &self.table
    }

    /// Copy the contents of `src` into `dst`.
    pub fn copy_frame(&mut self, src: PhysicalPage, dst: PhysicalPage) {
        let bytes = *self.frame(src);
        *self.frame_mut(dst) = bytes;
    }

    /// Fill `page` with `byte`.
    pub fn fill(&mut self, page: PhysicalPage, byte: u8) {
        self.frame_mut(page).fill(byte);
    }

    /// Read `buf.len()` bytes starting at `pa`; may cross frame boundaries.
    pub fn read(&self, pa: PhysicalAddress, buf: &mut [u8]) {
        let mut pa = pa;
        let mut done = 0;
        while done < buf.len() {
            let (page, offset, len) = Self::chunk(pa, buf.len() - done);
            buf[done..done + len].copy_from_slice(&self.frame(page)[offset..offset + len]);
            done += len;
            pa += len as u64;
        }
    }

    /// Write `bytes` starting at `pa`; may cross frame boundaries.
    pub fn write(&mut self, pa: PhysicalAddress, bytes: &[u8]) {
        let mut pa = pa;
        let mut done = 0;
        while done < bytes.len() {
            let (page, offset, len) = Self::chunk(pa, bytes.len() - done);
            self.frame_mut(page)[offset..offset + len].copy_from_slice(&bytes[done..done + len]);
            done += len;
            pa += len as u64;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn chunk(pa: PhysicalAddress, remaining: usize) -> (PhysicalPage, usize, usize) {
        let offset = pa.offset() as usize;
        let len = remaining.min(PAGE_SIZE as usize - offset);
        (pa.page(), offset, len)
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn slot(page: PhysicalPage) -> usize {
        page.index() as usize
    }
}

impl PhysMapper for PhysicalMemory {
    fn frame(&self, page: PhysicalPage) -> &Frame {
        &self.frames[Self::slot(page)]
    }

    fn frame_mut(&mut self, page: PhysicalPage) -> &mut Frame {
        &mut self.frames[Self::slot(page)]
    }
}

impl FrameAlloc for PhysicalMemory {
    fn alloc_4k(&mut self) -> Option<PhysicalPage> {
        let Some(page) = self.table.allocate() else {
            trace!("out of physical frames");
            return None;
        };
        self.fill(page, ALLOC_FILL);
        Some(page)
    }

    fn retain_4k(&mut self, page: PhysicalPage) -> Result<(), FrameError> {
        self.table.retain(page).map(|_| ())
    }

    fn release_4k(&mut self, page: PhysicalPage) -> Result<(), FrameError> {
        self.table.release(page).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_fills_pattern_and_counts() {
        let mut mem = PhysicalMemory::new(&MemoryLayout::default());
        let free = mem.frames().free_count();
        let page = mem.alloc_4k().unwrap();
        assert!(mem.frame(page).iter().all(|&b| b == ALLOC_FILL));
        assert_eq!(mem.frames().refcount(page), 1);
        assert_eq!(mem.frames().free_count(), free - 1);

        mem.release_4k(page).unwrap();
        assert_eq!(mem.frames().free_count(), free);
        assert!(mem.release_4k(page).is_err());
    }

    #[test]
    fn byte_access_crosses_frames() {
        let mut mem = PhysicalMemory::new(&MemoryLayout::default());
        let pa = PhysicalAddress::new(0x1ffe);
        mem.write(pa, b"abcd");
        let mut buf = [0u8; 4];
        mem.read(pa, &mut buf);
        assert_eq!(&buf, b"abcd");
        assert_eq!(&mem.frame(PhysicalPage::from_index(2))[..2], b"cd");
    }

    #[test]
    fn copy_frame_duplicates_contents() {
        let mut mem = PhysicalMemory::new(&MemoryLayout::default());
        let a = mem.alloc_4k().unwrap();
        let b = mem.alloc_4k().unwrap();
        mem.fill(a, 0x41);
        mem.copy_frame(a, b);
        assert!(mem.frame(b).iter().all(|&x| x == 0x41));
    }
}
