//! # Physical Memory and Frame Accounting
//!
//! This crate owns physical memory on behalf of the kernel. It is built on
//! two layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Physical Memory                        │
//! │    • byte access to every frame (PhysMapper)        │
//! │    • allocation pattern fill                        │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Frame Table                               │
//! │    • one reference count per 4 KiB frame            │
//! │    • first-fit allocation by increasing address     │
//! │    • reserved ranges never handed out               │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reference counting
//!
//! A frame's count is the number of address-space mappings that reference
//! it. Allocation sets it to one, fork sharing retains it, teardown releases
//! it. A release at zero is reported as
//! [`FrameError::NotAllocated`](kernel_vmem::FrameError::NotAllocated)
//! instead of wrapping, and leaves the counter unchanged.
//!
//! ## Allocation order
//!
//! Allocation is a first-fit scan from the lowest address. The scan is
//! linear in the number of frames, which is small and fixed. The order
//! is fully deterministic, so tests can predict which frame comes next.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod frame_alloc;
pub mod phys_mapper;

pub use frame_alloc::{FrameInfo, FrameTable};
pub use phys_mapper::{ALLOC_FILL, PhysicalMemory};
