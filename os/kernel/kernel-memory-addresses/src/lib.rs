//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses and 4 KiB page bases used
//! by the frame allocator, the page-table mapper and the process loader.
//!
//! ## Overview
//!
//! The kernel only ever deals in one page granularity, so every page type in
//! this crate is implicitly a 4 KiB page. The types exist to keep physical and
//! virtual values apart at compile time while staying zero-cost wrappers around
//! `u64`:
//!
//! | Concept | Description |
//! |---------|-------------|
//! | [`MemoryAddress`] | A raw 64-bit address, either physical or virtual. |
//! | [`MemoryPage`] | A page-aligned base address of a 4 KiB page. |
//!
//! These are then wrapped to distinguish between virtual and physical spaces:
//!
//! | Wrapper | Meaning |
//! |---------|---------|
//! | [`VirtualAddress`] / [`VirtualPage`] | Refer to page-table translated memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage`] | Refer to a physical frame. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x10_1234);
//! let page = va.page();
//! assert_eq!(page.base().as_u64(), 0x10_1000);
//! assert_eq!(va.offset(), 0x234);
//! assert_eq!(page.join(va.offset()), va);
//!
//! let frame = PhysicalPage::from_index(3);
//! assert_eq!(frame.base(), PhysicalAddress::new(0x3000));
//! assert_eq!(frame.index(), 3);
//! ```
//!
//! ## Design Notes
//!
//! - Page numbers ([`PhysicalPage::index`]) are the canonical identity of a
//!   frame. The frame allocator indexes its reference counts by them.
//! - Arithmetic is explicit: `addr + bytes` for addresses, [`next`](PhysicalPage::next)
//!   for pages. Nothing silently realigns an address except [`page`](PhysicalAddress::page).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod memory_address;
mod memory_page;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use memory_address::MemoryAddress;
pub use memory_page::MemoryPage;
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Number of low address bits covered by one page.
pub const PAGE_SHIFT: u32 = 12;

/// Size of one page (and one physical frame) in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Align `x` down to a multiple of `a` (which must be a power of two).
#[inline]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    x & !(a - 1)
}

/// Align `x` up to a multiple of `a` (which must be a power of two).
#[inline]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    (x + a - 1) & !(a - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_down(0x1fff, PAGE_SIZE), 0x1000);
        assert_eq!(align_up(0x1001, PAGE_SIZE), 0x2000);
        assert_eq!(align_up(0x2000, PAGE_SIZE), 0x2000);
    }

    #[test]
    fn physical_split_and_join() {
        let pa = PhysicalAddress::new(0x0012_3456);
        let page = pa.page();
        assert_eq!(page.base(), PhysicalAddress::new(0x0012_3000));
        assert_eq!(page.index(), 0x123);
        assert_eq!(page.join(pa.offset()), pa);
        assert!(!pa.is_page_aligned());
        assert!(page.base().is_page_aligned());
    }

    #[test]
    fn virtual_pages_step_by_page_size() {
        let page = VirtualAddress::new(0x2f_f000).page();
        assert_eq!(page.next().base().as_u64(), 0x30_0000);
        assert_eq!(VirtualPage::from_index(0x100).base().as_u64(), 0x10_0000);
    }

    #[test]
    fn new_aligned_rejects_unaligned_addresses() {
        assert!(PhysicalPage::new_aligned(PhysicalAddress::new(0x1001)).is_none());
        assert_eq!(
            PhysicalPage::new_aligned(PhysicalAddress::new(0x1000)),
            Some(PhysicalPage::from_index(1))
        );
    }

    #[test]
    fn debug_output_names_the_address_kind() {
        let pa = PhysicalAddress::new(0xB8000);
        let va = VirtualAddress::new(0xB8000);
        assert_eq!(format!("{pa:?}"), "PA(0x00000000000B8000)");
        assert_eq!(format!("{va:?}"), "VA(0x00000000000B8000)");
    }
}
