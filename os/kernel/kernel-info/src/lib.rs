//! # Kernel Configuration and Platform Layout
//!
//! This crate is the single source of truth for the machine the kernel runs
//! on: how much physical memory there is, how large a process address space
//! is, where the kernel image and its stack live, and which physical ranges
//! are owned by hardware.
//!
//! ## Address Space Layout
//!
//! Every process address space has the same shape. The kernel part below
//! [`PROC_START_ADDR`](memory::PROC_START_ADDR) is an identity mapping shared
//! (by copy) with the kernel page table. Everything above belongs to the
//! process.
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐  no access (null page)
//! 0x0000_1000 ├─────────────────────────────────┤
//!             │  kernel-only identity mapping   │
//! 0x0004_0000 ├─────────────────────────────────┤  KERNEL_START_ADDR
//!             │  kernel image                   │
//!             ├─────────────────────────────────┤
//! 0x0007_F000 │  kernel stack page              │  KERNEL_STACK_TOP - PAGE_SIZE
//! 0x000A_0000 ├─────────────────────────────────┤  I/O hole (reserved)
//! 0x000B_8000 │  console (user accessible)      │  CONSOLE_ADDR
//! 0x0010_0000 ├─────────────────────────────────┤  PROC_START_ADDR
//!             │  process code, data, heap       │
//! 0x002F_F000 │  process stack page             │
//! 0x0030_0000 └─────────────────────────────────┘  MEMSIZE_VIRTUAL
//! ```
//!
//! ## Configuration
//!
//! The constants in [`memory`] describe the default machine. The
//! [`MemoryLayout`](layout::MemoryLayout) struct bundles them into a value so
//! that tests and the simulator can run the very same kernel on a smaller
//! machine (e.g. to exercise memory exhaustion) without touching the code.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod layout;
pub mod memory;
