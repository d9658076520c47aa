//! # Kernel Core
//!
//! A small multitasking kernel: per-process address spaces over a
//! refcounted frame allocator, a fixed process table with fork and exit,
//! an exception and system call dispatcher, and a round-robin scheduler.
//!
//! ## Control flow
//!
//! ```text
//!  Kernel::new ──► Kernel::boot ──►  setup(1..) ──► run(1) ──► Platform::activate
//!                                                                   │
//!        ┌──────────────────────────────────────────────────────────┘
//!        ▼
//!  trap / int 0x80 ──► Kernel::exception / Kernel::syscall
//!                            │
//!                            ├─► fork / teardown / page_alloc
//!                            ▼
//!                      resume(current) or schedule() ──► Platform::activate
//! ```
//!
//! The kernel body runs in a single context. Every entry point takes the
//! register state the trampoline saved, stores it into the current process
//! and returns a [`Dispatch`] once it has handed control to the platform.
//! On real hardware `activate` never returns; here it does, and the caller
//! re-enters through the next trap or system call.
//!
//! ## Fatal conditions
//!
//! A kernel-mode page fault, an unknown trap or system call, an explicit
//! `PANIC` and any breach of frame accounting stop the machine. The entry
//! points surface these as [`KernelHalt`] instead of spinning, so the
//! platform decides how to halt.
//!
//! ## Resource exhaustion
//!
//! Running out of frames during `FORK` or `PAGE_ALLOC` is not fatal: every
//! partial allocation is rolled back and the caller sees `-1`.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

mod boot;
pub mod config;
pub mod elf;
mod error;
pub mod interrupts;
pub mod memshow;
pub mod platform;
pub mod program;
pub mod scheduler;
pub mod syscall;
pub mod task;
pub mod uaccess;
mod userland;

pub use boot::Kernel;
pub use config::KernelConfig;
pub use error::{ForkError, KernelHalt, PageAllocError, SetupError};
pub use platform::{Dispatch, Platform};
pub use program::{ProgramImage, ProgramImageBuilder, ProgramRegistry, ProgramSegment};
pub use task::{NPROC, Pid, Process, ProcessState, ProcessTable};
pub use uaccess::UserFault;

pub use kernel_syscall::{RegState, SYSCALL_FAILED, Sysno};
