use crate::{AddressSpace, FrameAlloc, MapError, Mapping, Permissions, PhysMapper};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};

/// Cursor over the data pages of an [`AddressSpace`].
///
/// The cursor is a position, not a borrow: it is advanced page by page and
/// queried or mapped against whatever memory the caller passes in. This lets
/// a loop map pages while holding the cursor.
///
/// ```rust,ignore
/// let mut it = space.cursor(VirtualAddress::new(PROC_START_ADDR));
/// while it.va() < end {
///     if let Some(m) = it.mapping(&mem) { /* … */ }
///     it.advance();
/// }
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MappingCursor {
    space: AddressSpace,
    va: VirtualAddress,
}

impl MappingCursor {
    #[inline]
    #[must_use]
    pub const fn new(space: AddressSpace, va: VirtualAddress) -> Self {
        Self { space, va }
    }

    /// Current virtual address.
    #[inline]
    #[must_use]
    pub const fn va(&self) -> VirtualAddress {
        self.va
    }

    /// The mapping at the current position, if present.
    #[inline]
    pub fn mapping<M: PhysMapper>(&self, mem: &M) -> Option<Mapping> {
        self.space.lookup(mem, self.va)
    }

    /// Effective permissions at the current position; [`Permissions::NONE`] if unmapped.
    #[inline]
    pub fn perm<M: PhysMapper>(&self, mem: &M) -> Permissions {
        self.mapping(mem).map_or(Permissions::NONE, |m| m.perm)
    }

    /// Map the current page. See [`AddressSpace::try_map`].
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] if a table level could not be allocated.
    #[inline]
    pub fn try_map<M: PhysMapper + FrameAlloc>(
        &self,
        mem: &mut M,
        page: PhysicalPage,
        perm: Permissions,
    ) -> Result<(), MapError> {
        self.space.try_map(mem, self.va, page, perm)
    }

    /// Map the current page. See [`AddressSpace::map`].
    ///
    /// # Panics
    /// If a table level could not be allocated.
    #[inline]
    pub fn map<M: PhysMapper + FrameAlloc>(
        &self,
        mem: &mut M,
        page: PhysicalPage,
        perm: Permissions,
    ) {
        self.space.map(mem, self.va, page, perm);
    }

    /// Move to the start of the next page.
    #[inline]
    pub fn advance(&mut self) {
        self.va = self.va.page().next().base();
    }

    /// Jump to `va`.
    #[inline]
    pub const fn seek(&mut self, va: VirtualAddress) {
        self.va = va;
    }

    /// Advance while the position stays below `end`, yielding each position.
    ///
    /// Useful for `for va in cursor.pages_until(end)`. The cursor itself is not
    /// moved; use the yielded addresses with [`AddressSpace`] directly.
    #[must_use]
    pub fn pages_until(&self, end: VirtualAddress) -> impl Iterator<Item = VirtualAddress> + use<> {
        let start = self.va.page().base().as_u64();
        (start..end.as_u64())
            .step_by(PAGE_SIZE as usize)
            .map(VirtualAddress::new)
    }
}
