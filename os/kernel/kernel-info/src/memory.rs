//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// Size of physical memory in bytes.
pub const MEMSIZE_PHYSICAL: u64 = 0x20_0000;

/// Size of a process virtual address space in bytes.
///
/// The process stack occupies the last page below this address.
pub const MEMSIZE_VIRTUAL: u64 = 0x30_0000;

/// First virtual address owned by a process. Everything below is the
/// identity-mapped kernel region.
pub const PROC_START_ADDR: u64 = 0x10_0000;

/// Where the kernel image starts in physical (and identity-mapped virtual) memory.
pub const KERNEL_START_ADDR: u64 = 0x4_0000;

/// End of the kernel image.
pub const KERNEL_END_ADDR: u64 = 0x6_0000;

/// Top of the kernel stack; the stack occupies the page directly below.
pub const KERNEL_STACK_TOP: u64 = 0x8_0000;

/// Start of the legacy I/O hole (VGA, option ROMs, BIOS).
pub const IO_HOLE_START: u64 = 0xA_0000;

/// End of the legacy I/O hole.
pub const IO_HOLE_END: u64 = 0x10_0000;

/// The text-mode console, mapped user accessible into every process.
pub const CONSOLE_ADDR: u64 = 0xB_8000;

/// Timer interrupt frequency.
pub const HZ: u32 = 100;

const _: () = {
    assert!(MEMSIZE_PHYSICAL.is_multiple_of(PAGE_SIZE));
    assert!(MEMSIZE_VIRTUAL.is_multiple_of(PAGE_SIZE));
    assert!(PROC_START_ADDR.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_START_ADDR.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_STACK_TOP.is_multiple_of(PAGE_SIZE));
    assert!(CONSOLE_ADDR.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_END_ADDR <= KERNEL_STACK_TOP - PAGE_SIZE);
    assert!(KERNEL_STACK_TOP <= IO_HOLE_START);
    assert!(CONSOLE_ADDR >= IO_HOLE_START && CONSOLE_ADDR < IO_HOLE_END);
    assert!(IO_HOLE_END <= PROC_START_ADDR);
    assert!(PROC_START_ADDR < MEMSIZE_PHYSICAL);
    assert!(MEMSIZE_PHYSICAL <= MEMSIZE_VIRTUAL);
};
