//! # Address Space (x86-64, PML4-rooted)
//!
//! Builds and queries a **single** virtual address space: a tree of 4 KiB
//! tables rooted at a PML4 frame, stored in frames handed out by a
//! [`FrameAlloc`] and read through a [`PhysMapper`].
//!
//! ## Highlights
//!
//! - [`AddressSpace::try_map`] installs one 4 KiB mapping, allocating missing
//!   intermediate tables on the way down; [`AddressSpace::map`] does the same
//!   but treats exhaustion as fatal.
//! - [`AddressSpace::lookup`] returns the leaf mapping with the permissions
//!   intersected over every level, like the MMU sees them.
//! - [`AddressSpace::check_access`] emulates the MMU check for a single access
//!   and yields the page-fault error code a denied access would raise.
//! - [`MappingCursor`] walks data pages, [`TableCursor`] walks the table
//!   frames themselves.
//!
//! ## Design
//!
//! - Non-leaf links are always `P|W|U`. Permissions are decided by the leaf.
//! - The handle is just the root frame. It is `Copy` and borrows nothing;
//!   every operation takes the memory it works on as an argument.
//! - Mapping with a non-present permission set never allocates: it clears an
//!   existing leaf if the table levels exist, and is a no-op otherwise.

mod cursor;
mod table_cursor;

pub use cursor::MappingCursor;
pub use table_cursor::{TableCursor, TableFrame};

use crate::{
    FrameAlloc, MapError, MemoryAccess, PageEntryBits, PageFaultError, Permissions, PhysMapper,
    TableLevel,
};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};

/// Handle to a single, concrete address space.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct AddressSpace {
    root: PhysicalPage, // PML4 frame
}

/// A present leaf mapping as seen through a walk.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Mapping {
    /// The virtual address that was looked up.
    pub va: VirtualAddress,
    /// The mapped frame.
    pub page: PhysicalPage,
    /// Effective permissions, intersected across all levels.
    pub perm: Permissions,
}

impl Mapping {
    /// The physical address `va` translates to.
    #[inline]
    #[must_use]
    pub const fn pa(&self) -> PhysicalAddress {
        self.page.join(self.va.offset())
    }
}

impl AddressSpace {
    /// Allocate and clear a fresh root table.
    ///
    /// Returns `None` when no frame is available.
    pub fn allocate<M: PhysMapper + FrameAlloc>(mem: &mut M) -> Option<Self> {
        let root = mem.alloc_4k()?;
        mem.zero_frame(root);
        Some(Self { root })
    }

    /// Wrap an existing root table frame.
    #[inline]
    #[must_use]
    pub const fn from_root(root: PhysicalPage) -> Self {
        Self { root }
    }

    /// Physical page of the PML4.
    #[inline]
    #[must_use]
    pub const fn root_page(&self) -> PhysicalPage {
        self.root
    }

    /// A data cursor positioned at `va`.
    #[inline]
    #[must_use]
    pub const fn cursor(self, va: VirtualAddress) -> MappingCursor {
        MappingCursor::new(self, va)
    }

    /// A cursor over the table frames below the root.
    #[inline]
    #[must_use]
    pub fn table_frames<M: PhysMapper>(self, mem: &M) -> TableCursor<'_, M> {
        TableCursor::new(mem, self)
    }

    /// The leaf mapping for `va`, if present.
    ///
    /// A walk stops at the first non-present link. Huge-page links are never
    /// created by this crate and are treated as unmapped.
    pub fn lookup<M: PhysMapper>(&self, mem: &M, va: VirtualAddress) -> Option<Mapping> {
        let mut table = self.root;
        let mut perm = Permissions::USER_RW;
        for level in TableLevel::LINKS {
            let entry = mem.read_entry(table, level.index_of(va));
            if !entry.present() || entry.large_page() {
                return None;
            }
            perm = perm.intersect(entry.permissions());
            table = entry.physical_page();
        }

        let leaf = mem.read_entry(table, TableLevel::Pt.index_of(va));
        if !leaf.present() {
            return None;
        }
        Some(Mapping {
            va,
            page: leaf.physical_page(),
            perm: perm.intersect(leaf.permissions()),
        })
    }

    /// Translate `va` without any permission check.
    #[inline]
    pub fn translate<M: PhysMapper>(&self, mem: &M, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.lookup(mem, va).map(|m| m.pa())
    }

    /// Install `va → page` with `perm`.
    ///
    /// Missing intermediate tables are allocated and zeroed. An existing leaf
    /// is overwritten; releasing the frame it pointed to is the caller's job.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] if a table could not be allocated. Tables
    /// allocated before the failure stay linked into this address space and are
    /// reclaimed by the caller's teardown.
    pub fn try_map<M: PhysMapper + FrameAlloc>(
        &self,
        mem: &mut M,
        va: VirtualAddress,
        page: PhysicalPage,
        perm: Permissions,
    ) -> Result<(), MapError> {
        let va = va.page().base();
        if !perm.present() {
            if let Some(pt) = self.leaf_table(mem, va) {
                mem.write_entry(pt, TableLevel::Pt.index_of(va), PageEntryBits::new());
            }
            return Ok(());
        }

        let mut table = self.root;
        for level in TableLevel::LINKS {
            let index = level.index_of(va);
            let entry = mem.read_entry(table, index);
            table = if entry.present() {
                entry.physical_page()
            } else {
                let next_level = level.next().unwrap_or(TableLevel::Pt);
                let next = mem.alloc_4k().ok_or(MapError::OutOfMemory {
                    va,
                    level: next_level,
                })?;
                mem.zero_frame(next);
                mem.write_entry(table, index, PageEntryBits::table(next));
                next
            };
        }

        mem.write_entry(
            table,
            TableLevel::Pt.index_of(va),
            PageEntryBits::leaf(page, perm),
        );
        Ok(())
    }

    /// Like [`try_map`](Self::try_map), for callers that cannot recover.
    ///
    /// # Panics
    /// If an intermediate table cannot be allocated.
    pub fn map<M: PhysMapper + FrameAlloc>(
        &self,
        mem: &mut M,
        va: VirtualAddress,
        page: PhysicalPage,
        perm: Permissions,
    ) {
        if let Err(e) = self.try_map(mem, va, page, perm) {
            panic!("mapping {va} failed: {e}");
        }
    }

    /// Check a single access the way the MMU would.
    ///
    /// # Errors
    /// The [`PageFaultError`] the hardware would report if the access is denied.
    pub fn check_access<M: PhysMapper>(
        &self,
        mem: &M,
        va: VirtualAddress,
        access: MemoryAccess,
    ) -> Result<PhysicalAddress, PageFaultError> {
        let Some(mapping) = self.lookup(mem, va) else {
            return Err(PageFaultError::for_access(access, false));
        };
        let denied =
            (access.user && !mapping.perm.user()) || (access.write && !mapping.perm.writable());
        if denied {
            return Err(PageFaultError::for_access(access, true));
        }
        Ok(mapping.pa())
    }

    /// The page table (last level) covering `va`, without allocating.
    fn leaf_table<M: PhysMapper>(&self, mem: &M, va: VirtualAddress) -> Option<PhysicalPage> {
        let mut table = self.root;
        for level in TableLevel::LINKS {
            let entry = mem.read_entry(table, level.index_of(va));
            if !entry.present() || entry.large_page() {
                return None;
            }
            table = entry.physical_page();
        }
        Some(table)
    }
}
