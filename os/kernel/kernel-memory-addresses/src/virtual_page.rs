use crate::{MemoryPage, VirtualAddress};
use core::fmt;

/// Base of a 4 KiB virtual page.
///
/// ### Invariants
/// - The low 12 bits of the base are always zero.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(pub(crate) MemoryPage);

impl VirtualPage {
    /// The page containing `va`.
    #[inline]
    #[must_use]
    pub const fn from_addr(va: VirtualAddress) -> Self {
        Self(MemoryPage::from_addr(va.0))
    }

    #[inline]
    #[must_use]
    pub const fn new_aligned(va: VirtualAddress) -> Option<Self> {
        match MemoryPage::new_aligned(va.0) {
            Some(p) => Some(Self(p)),
            None => None,
        }
    }

    /// The page with page number `index`.
    #[inline]
    #[must_use]
    pub const fn from_index(index: u64) -> Self {
        Self(MemoryPage::from_index(index))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0.base())
    }

    /// Page number.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0.index()
    }

    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> VirtualAddress {
        VirtualAddress(self.0.join(offset))
    }

    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.next())
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage(0x{:016X})", self.0.base().as_u64())
    }
}

impl From<VirtualPage> for VirtualAddress {
    #[inline]
    fn from(p: VirtualPage) -> Self {
        p.base()
    }
}
