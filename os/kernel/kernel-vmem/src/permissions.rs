use bitfield_struct::bitfield;
use core::fmt;

/// Permission set of a mapping: `{present, writable, user}`.
///
/// The bit positions match the low bits of an x86-64 page table entry, so
/// a permission value can be compared directly against a raw entry's flags.
#[bitfield(u8)]
#[derive(PartialEq, Eq, Hash)]
pub struct Permissions {
    /// The mapping exists.
    pub present: bool,
    /// Writes are allowed.
    pub writable: bool,
    /// User mode may access the page.
    pub user: bool,
    #[bits(5)]
    __: u8,
}

impl Permissions {
    /// No access at all.
    pub const NONE: Self = Self::new();

    /// Kernel read/write (`P|W`).
    pub const KERNEL_RW: Self = Self::new().with_present(true).with_writable(true);

    /// User read/write (`P|W|U`).
    pub const USER_RW: Self = Self::KERNEL_RW.with_user(true);

    /// User read-only (`P|U`).
    pub const USER_RO: Self = Self::new().with_present(true).with_user(true);

    /// Permissions allowed by both `self` and `other`.
    ///
    /// A table walk intersects the permissions of every level.
    #[inline]
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() & other.into_bits())
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.present(), 'P'),
            flag(self.writable(), 'W'),
            flag(self.user(), 'U')
        )
    }
}
