use crate::{MemoryPage, PhysicalAddress};
use core::fmt;

/// Base of a 4 KiB physical frame.
///
/// ### Invariants
/// - The low 12 bits of the base are always zero.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(pub(crate) MemoryPage);

impl PhysicalPage {
    /// The frame containing `pa`.
    #[inline]
    #[must_use]
    pub const fn from_addr(pa: PhysicalAddress) -> Self {
        Self(MemoryPage::from_addr(pa.0))
    }

    #[inline]
    #[must_use]
    pub const fn new_aligned(pa: PhysicalAddress) -> Option<Self> {
        match MemoryPage::new_aligned(pa.0) {
            Some(p) => Some(Self(p)),
            None => None,
        }
    }

    /// The frame with frame number `index`.
    #[inline]
    #[must_use]
    pub const fn from_index(index: u64) -> Self {
        Self(MemoryPage::from_index(index))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress(self.0.base())
    }

    /// Frame number.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0.index()
    }

    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> PhysicalAddress {
        PhysicalAddress(self.0.join(offset))
    }

    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.next())
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage(0x{:016X})", self.0.base().as_u64())
    }
}

impl From<PhysicalPage> for PhysicalAddress {
    #[inline]
    fn from(p: PhysicalPage) -> Self {
        p.base()
    }
}
