//! Table levels and entry indices of the 4-level x86-64 walk.

use core::fmt;
use kernel_memory_addresses::VirtualAddress;

/// Number of entries in every table level.
pub const ENTRIES_PER_TABLE: usize = 512;

/// One of the four levels of a page table walk, root first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TableLevel {
    /// Page Map Level 4, the root referenced by CR3.
    Pml4,
    /// Page Directory Pointer Table.
    Pdpt,
    /// Page Directory.
    Pd,
    /// Page Table; its entries are 4 KiB leaves.
    Pt,
}

impl TableLevel {
    /// Levels holding links to further tables.
    pub const LINKS: [Self; 3] = [Self::Pml4, Self::Pdpt, Self::Pd];

    /// Bit position of this level's index in a virtual address.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Pml4 => 39,
            Self::Pdpt => 30,
            Self::Pd => 21,
            Self::Pt => 12,
        }
    }

    /// Bytes of virtual address space covered by one entry at this level.
    #[inline]
    #[must_use]
    pub const fn entry_span(self) -> u64 {
        1 << self.shift()
    }

    /// The level an entry of this level points to.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pml4 => Some(Self::Pdpt),
            Self::Pdpt => Some(Self::Pd),
            Self::Pd => Some(Self::Pt),
            Self::Pt => None,
        }
    }

    /// The index selecting `va`'s entry in a table of this level.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(self, va: VirtualAddress) -> TableIndex {
        TableIndex::new(((va.as_u64() >> self.shift()) & 0x1ff) as u16)
    }
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pml4 => "PML4",
            Self::Pdpt => "PDPT",
            Self::Pd => "PD",
            Self::Pt => "PT",
        })
    }
}

/// Index into one table (0..512).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

impl TableIndex {
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES_PER_TABLE);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    /// Byte offset of this entry inside its table frame.
    #[inline]
    #[must_use]
    pub const fn byte_offset(self) -> usize {
        self.as_usize() * size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_indices_of_user_stack() {
        let va = VirtualAddress::new(0x2f_f000);
        assert_eq!(TableLevel::Pml4.index_of(va).as_usize(), 0);
        assert_eq!(TableLevel::Pdpt.index_of(va).as_usize(), 0);
        assert_eq!(TableLevel::Pd.index_of(va).as_usize(), 1);
        assert_eq!(TableLevel::Pt.index_of(va).as_usize(), 0xff);
    }

    #[test]
    fn levels_chain_down_to_the_page_table() {
        let mut level = TableLevel::Pml4;
        let mut seen = 1;
        while let Some(next) = level.next() {
            assert!(next.entry_span() < level.entry_span());
            level = next;
            seen += 1;
        }
        assert_eq!(level, TableLevel::Pt);
        assert_eq!(seen, 4);
        assert_eq!(TableLevel::Pt.entry_span(), 4096);
    }
}
