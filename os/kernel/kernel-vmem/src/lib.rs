//! # Virtual Memory Support
//!
//! x86-64 paging structures for the kernel's per-process address spaces,
//! expressed over an abstract physical memory.
//!
//! ## What you get
//! - An [`AddressSpace`] describing a `PML4` root page table, with
//!   [`try_map`](AddressSpace::try_map), [`lookup`](AddressSpace::lookup) and an
//!   MMU-style [`check_access`](AddressSpace::check_access).
//! - Two cursors: [`MappingCursor`] over data pages and [`TableCursor`] over
//!   the table frames themselves.
//! - The raw [`PageEntryBits`] and the [`Permissions`] subset that mappings
//!   are built from.
//! - A tiny memory interface ([`FrameAlloc`], [`PhysMapper`]) that the frame
//!   allocator implements.
//!
//! ## x86-64 Virtual Address → Physical Address Walk
//!
//! Each 48-bit virtual address is divided into five fields:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! The CPU uses these fields as **indices** into four levels of page tables,
//! each level containing 512 (2⁹) entries of 8 bytes (64 bits) each.
//!
//! ```text
//!  PML4  →  PDPT  →  PD  →  PT  →  Physical Page
//!   │        │        │        │
//!   │        │        │        └───► PTE   (Page Table Entry)  → maps 4 KiB page
//!   │        │        └────────────► PDE   (Page Directory Entry)
//!   │        └─────────────────────► PDPTE (Page Directory Pointer Table Entry)
//!   └──────────────────────────────► PML4E (Page Map Level 4 Entry)
//! ```
//!
//! Only 4 KiB leaves are used. Every table is itself one frame obtained from
//! the [`FrameAlloc`], which is why address-space teardown must release the
//! table frames as well as the data frames.
//!
//! ### Permissions
//!
//! The effective permission of a mapping is the intersection of the
//! `present`, `writable` and `user` bits of every entry on the walk. Links
//! created here are always `P|W|U`, so in practice the leaf decides.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod address_space;
mod error;
mod fault;
mod page_entry_bits;
mod page_table;
mod permissions;

pub use crate::address_space::{AddressSpace, Mapping, MappingCursor, TableCursor, TableFrame};
pub use crate::error::{FrameError, MapError};
pub use crate::fault::{MemoryAccess, PageFaultError};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{ENTRIES_PER_TABLE, TableIndex, TableLevel};
pub use crate::permissions::Permissions;

use kernel_memory_addresses::PhysicalPage;

/// Size of one frame in bytes, as a slice length.
pub const FRAME_SIZE: usize = 4096;

/// Raw contents of one physical frame.
pub type Frame = [u8; FRAME_SIZE];

/// Reference-counted source of **physical** 4 KiB frames.
///
/// Every frame handed out starts with a reference count of one. Sharing a
/// frame between address spaces retains it, every unmapping owner releases
/// it, and the frame becomes free again when the count drops to zero.
pub trait FrameAlloc {
    /// Allocate one frame. Returns `None` on out-of-memory.
    fn alloc_4k(&mut self) -> Option<PhysicalPage>;

    /// Add a reference to an allocated frame.
    ///
    /// # Errors
    /// [`FrameError`] if the frame is not currently allocated.
    fn retain_4k(&mut self, page: PhysicalPage) -> Result<(), FrameError>;

    /// Drop a reference. Releasing the null frame is a no-op.
    ///
    /// # Errors
    /// [`FrameError::NotAllocated`] if the reference count already is zero.
    fn release_4k(&mut self, page: PhysicalPage) -> Result<(), FrameError>;
}

/// Byte-level access to physical frames.
///
/// The kernel reaches all physical memory through this trait, both for page
/// table entries and for the contents of data pages.
pub trait PhysMapper {
    /// Borrow the bytes of `page`.
    fn frame(&self, page: PhysicalPage) -> &Frame;

    /// Mutably borrow the bytes of `page`.
    fn frame_mut(&mut self, page: PhysicalPage) -> &mut Frame;

    /// Read entry `index` of the table stored in `table`.
    fn read_entry(&self, table: PhysicalPage, index: TableIndex) -> PageEntryBits {
        let offset = index.byte_offset();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.frame(table)[offset..offset + 8]);
        PageEntryBits::from_bits(u64::from_le_bytes(raw))
    }

    /// Write entry `index` of the table stored in `table`.
    fn write_entry(&mut self, table: PhysicalPage, index: TableIndex, entry: PageEntryBits) {
        let offset = index.byte_offset();
        self.frame_mut(table)[offset..offset + 8].copy_from_slice(&entry.into_bits().to_le_bytes());
    }

    /// Fill `page` with zeroes.
    fn zero_frame(&mut self, page: PhysicalPage) {
        self.frame_mut(page).fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

    /// A trivial **bump** allocator over an in-memory "RAM".
    ///
    /// Frames are handed out in order and never reused; reference counts are
    /// not tracked here, the `kernel-alloc` crate does that.
    struct TestPhys {
        frames: Vec<Frame>,
        next: u64,
    }

    impl TestPhys {
        fn with_frames(n: usize) -> Self {
            Self {
                frames: alloc::vec![[0u8; FRAME_SIZE]; n],
                next: 1,
            }
        }

        fn allocated(&self) -> u64 {
            self.next - 1
        }
    }

    impl FrameAlloc for TestPhys {
        fn alloc_4k(&mut self) -> Option<PhysicalPage> {
            if self.next as usize >= self.frames.len() {
                return None;
            }
            let page = PhysicalPage::from_index(self.next);
            self.next += 1;
            self.frames[page.index() as usize].fill(0xCC);
            Some(page)
        }

        fn retain_4k(&mut self, _page: PhysicalPage) -> Result<(), FrameError> {
            Ok(())
        }

        fn release_4k(&mut self, _page: PhysicalPage) -> Result<(), FrameError> {
            Ok(())
        }
    }

    impl PhysMapper for TestPhys {
        fn frame(&self, page: PhysicalPage) -> &Frame {
            &self.frames[page.index() as usize]
        }

        fn frame_mut(&mut self, page: PhysicalPage) -> &mut Frame {
            &mut self.frames[page.index() as usize]
        }
    }

    const DATA: PhysicalPage = PhysicalPage::from_index(60);

    #[test]
    fn map_creates_tables_and_leaf() {
        let mut mem = TestPhys::with_frames(64);
        let space = AddressSpace::allocate(&mut mem).unwrap();
        let va = VirtualAddress::new(0x10_0000);

        space.try_map(&mut mem, va, DATA, Permissions::USER_RW).unwrap();

        // root + PDPT + PD + PT
        assert_eq!(mem.allocated(), 4);
        let m = space.lookup(&mem, va + 0x10).unwrap();
        assert_eq!(m.page, DATA);
        assert_eq!(m.perm, Permissions::USER_RW);
        assert_eq!(m.pa(), PhysicalAddress::new(DATA.base().as_u64() + 0x10));

        // A neighbouring page reuses every table level.
        space
            .try_map(&mut mem, va + 0x1000, DATA, Permissions::USER_RO)
            .unwrap();
        assert_eq!(mem.allocated(), 4);
        assert_eq!(
            space.lookup(&mem, va + 0x1000).unwrap().perm,
            Permissions::USER_RO
        );
    }

    #[test]
    fn fresh_tables_do_not_leak_allocation_pattern() {
        let mut mem = TestPhys::with_frames(64);
        let space = AddressSpace::allocate(&mut mem).unwrap();
        space
            .try_map(&mut mem, VirtualAddress::new(0x20_0000), DATA, Permissions::USER_RW)
            .unwrap();
        assert!(space.lookup(&mem, VirtualAddress::new(0x40_0000)).is_none());
        assert!(space.lookup(&mem, VirtualAddress::new(0x20_1000)).is_none());
    }

    #[test]
    fn non_present_mapping_clears_without_allocating() {
        let mut mem = TestPhys::with_frames(64);
        let space = AddressSpace::allocate(&mut mem).unwrap();
        let va = VirtualAddress::new(0x10_0000);

        space.try_map(&mut mem, VirtualAddress::new(0x30_0000), DATA, Permissions::NONE).unwrap();
        assert_eq!(mem.allocated(), 1);

        space.try_map(&mut mem, va, DATA, Permissions::USER_RW).unwrap();
        space.try_map(&mut mem, va, DATA, Permissions::NONE).unwrap();
        assert!(space.lookup(&mem, va).is_none());
    }

    #[test]
    fn out_of_memory_keeps_allocated_levels() {
        // Frame 0 is never handed out, so this leaves root + two levels.
        let mut mem = TestPhys::with_frames(4);
        let space = AddressSpace::allocate(&mut mem).unwrap();
        let va = VirtualAddress::new(0x10_0000);

        let err = space.try_map(&mut mem, va, DATA, Permissions::USER_RW).unwrap_err();
        assert_eq!(
            err,
            MapError::OutOfMemory {
                va,
                level: TableLevel::Pt
            }
        );
        assert!(space.lookup(&mem, va).is_none());
        assert_eq!(space.table_frames(&mem).count(), 2);
    }

    #[test]
    #[should_panic(expected = "mapping")]
    fn map_panics_on_exhaustion() {
        let mut mem = TestPhys::with_frames(2);
        let space = AddressSpace::allocate(&mut mem).unwrap();
        space.map(&mut mem, VirtualAddress::new(0x1000), DATA, Permissions::KERNEL_RW);
    }

    #[test]
    fn table_cursor_visits_tables_not_data() {
        let mut mem = TestPhys::with_frames(64);
        let space = AddressSpace::allocate(&mut mem).unwrap();
        space
            .try_map(&mut mem, VirtualAddress::new(0x1000), DATA, Permissions::KERNEL_RW)
            .unwrap();
        space
            .try_map(&mut mem, VirtualAddress::new(0x2f_f000), DATA, Permissions::USER_RW)
            .unwrap();

        let tables: Vec<_> = space.table_frames(&mem).collect();
        let levels: Vec<_> = tables.iter().map(|t| t.level).collect();
        assert_eq!(
            levels,
            [TableLevel::Pdpt, TableLevel::Pd, TableLevel::Pt, TableLevel::Pt]
        );
        assert_eq!(tables[3].va, VirtualAddress::new(0x20_0000));
        assert!(tables.iter().all(|t| t.page != DATA && t.page != space.root_page()));
    }

    #[test]
    fn check_access_reports_hardware_error_codes() {
        let mut mem = TestPhys::with_frames(64);
        let space = AddressSpace::allocate(&mut mem).unwrap();
        let ro = VirtualAddress::new(0x10_0000);
        let kernel = VirtualAddress::new(0x5000);
        space.try_map(&mut mem, ro, DATA, Permissions::USER_RO).unwrap();
        space.try_map(&mut mem, kernel, DATA, Permissions::KERNEL_RW).unwrap();

        assert!(space.check_access(&mem, ro, MemoryAccess::USER_READ).is_ok());

        let err = space.check_access(&mem, ro, MemoryAccess::USER_WRITE).unwrap_err();
        assert!(err.present() && err.write() && err.user());

        let err = space.check_access(&mem, kernel, MemoryAccess::USER_READ).unwrap_err();
        assert!(err.present() && !err.write());

        let err = space
            .check_access(&mem, VirtualAddress::new(0x11_0000), MemoryAccess::USER_READ)
            .unwrap_err();
        assert!(!err.present());

        assert!(space.check_access(&mem, kernel, MemoryAccess::KERNEL_WRITE).is_ok());
    }

    #[test]
    fn cursor_walks_pages_and_maps_in_place() {
        let mut mem = TestPhys::with_frames(64);
        let space = AddressSpace::allocate(&mut mem).unwrap();
        let mut it = space.cursor(VirtualAddress::new(0x10_0000));
        for _ in 0..3 {
            it.try_map(&mut mem, DATA, Permissions::USER_RW).unwrap();
            it.advance();
        }
        assert_eq!(it.va(), VirtualAddress::new(0x10_3000));
        assert_eq!(it.perm(&mem), Permissions::NONE);

        it.seek(VirtualAddress::new(0x10_2abc));
        assert_eq!(it.mapping(&mem).unwrap().page, DATA);
        it.advance();
        assert_eq!(it.va(), VirtualAddress::new(0x10_3000));

        let pages: Vec<_> = space
            .cursor(VirtualAddress::new(0x10_0000))
            .pages_until(VirtualAddress::new(0x10_3000))
            .collect();
        assert_eq!(pages.len(), 3);
    }
}
