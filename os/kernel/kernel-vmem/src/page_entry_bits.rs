use crate::Permissions;
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalPage;

/// Represents a single 64-bit x86-64 page table entry in its raw bitfield form.
///
/// This structure models the **common superset** of fields found in all
/// four paging levels (PML4E, PDPTE, PDE, PTE). The kernel only builds 4 KiB
/// mappings, so `large_page` is never set by this crate; it is still decoded
/// so that a walk can refuse to descend into a huge-page leaf.
///
/// ### Bit layout (canonical)
///
/// | Bits      | Name / Mnemonic   | Meaning |
/// |-----------|-------------------|----------|
/// | 0         | `P` (present)     | Valid entry if set |
/// | 1         | `RW`              | Writable if set |
/// | 2         | `US`              | User-mode accessible if set |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Disable caching |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (leaf only) |
/// | 7         | `PS`              | Large page flag |
/// | 8         | `G`               | Global (leaf only) |
/// | 9–11      | OS avail low      | Reserved for OS use |
/// | 12–51     | `addr`            | Physical frame bits [51:12] |
/// | 52–58     | OS avail high     | Reserved for OS use |
/// | 59–62     | `PKU` / OS use    | Protection key or OS use |
/// | 63        | `NX`              | Execute disable |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalPage;
/// # use kernel_vmem::{PageEntryBits, Permissions};
/// let e = PageEntryBits::leaf(PhysicalPage::from_index(0x123), Permissions::USER_RO);
/// assert!(e.present());
/// assert!(!e.writable());
/// assert_eq!(e.physical_page().index(), 0x123);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU, never a permission.
    pub accessed: bool,

    /// Dirty (D, bit 6), leaf only.
    pub dirty: bool,

    /// Large Page / Page Size (PS, bit 7).
    pub large_page: bool,

    /// Global (G, bit 8), leaf only.
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available_low: u8,

    /// Physical address bits [51:12] (bits 12..=51).
    #[bits(40)]
    phys_addr_bits_51_12: u64,

    /// OS-available (bits 52..=58).
    #[bits(7)]
    pub os_available_high: u8,

    /// Protection Key (PKU, bits 59..=62) if supported; otherwise OS use.
    #[bits(4)]
    pub protection_key: u8,

    /// No-Execute (NX, bit 63).
    pub no_execute: bool,
}

impl PageEntryBits {
    /// A non-leaf entry linking to the next table level.
    ///
    /// Links are always present, writable and user accessible; the effective
    /// permission of a mapping is decided by its leaf entry.
    #[inline]
    #[must_use]
    pub const fn table(next: PhysicalPage) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
            .with_phys_addr_bits_51_12(next.index())
    }

    /// A 4 KiB leaf entry mapping `page` with `perm`.
    #[inline]
    #[must_use]
    pub const fn leaf(page: PhysicalPage, perm: Permissions) -> Self {
        Self::new()
            .with_present(perm.present())
            .with_writable(perm.writable())
            .with_user_access(perm.user())
            .with_phys_addr_bits_51_12(page.index())
    }

    /// The frame this entry points at (next table or mapped page).
    #[inline]
    #[must_use]
    pub const fn physical_page(&self) -> PhysicalPage {
        PhysicalPage::from_index(self.phys_addr_bits_51_12())
    }

    #[inline]
    pub const fn set_physical_page(&mut self, page: PhysicalPage) {
        self.set_phys_addr_bits_51_12(page.index());
    }

    /// The permission subset of this entry.
    #[inline]
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        Permissions::new()
            .with_present(self.present())
            .with_writable(self.writable())
            .with_user(self.user_access())
    }
}
