use crate::{MemoryAddress, PAGE_SHIFT, PAGE_SIZE};
use core::fmt;

/// Page-aligned base of a 4 KiB page, physical or virtual.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryPage(MemoryAddress);

impl MemoryPage {
    /// The page containing `addr`.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: MemoryAddress) -> Self {
        Self(MemoryAddress::new(addr.as_u64() & !(PAGE_SIZE - 1)))
    }

    /// Only accepts addresses that already are page aligned.
    #[inline]
    #[must_use]
    pub const fn new_aligned(addr: MemoryAddress) -> Option<Self> {
        if addr.is_page_aligned() {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// The page with page number `index`.
    #[inline]
    #[must_use]
    pub const fn from_index(index: u64) -> Self {
        Self(MemoryAddress::new(index << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> MemoryAddress {
        self.0
    }

    /// Page number, i.e. the base address divided by the page size.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0.as_u64() >> PAGE_SHIFT
    }

    /// Combine the page base with an in-page offset.
    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> MemoryAddress {
        debug_assert!(offset < PAGE_SIZE);
        MemoryAddress::new(self.0.as_u64() + offset)
    }

    /// The directly following page.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(MemoryAddress::new(self.0.as_u64() + PAGE_SIZE))
    }
}

impl fmt::Display for MemoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for MemoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryPage(0x{:016X})", self.0.as_u64())
    }
}
