//! Process descriptors and their lifecycle.

mod fork;
mod table;
mod teardown;

pub use table::ProcessTable;

pub(crate) use fork::fork;
pub(crate) use teardown::teardown;

use kernel_alloc::PhysicalMemory;
use core::fmt;
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
use kernel_syscall::RegState;
use kernel_vmem::{AddressSpace, FrameAlloc, FrameError, MapError, Permissions};

/// Number of process slots, including the unused kernel slot 0.
pub const NPROC: usize = 16;

/// Process identifier; the index of the process slot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pid(usize);

impl Pid {
    /// Slot 0. Never runnable; the current pid before the first process runs.
    pub const KERNEL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(slot: usize) -> Self {
        Self(slot)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ProcessState {
    #[default]
    Free,
    Runnable,
    /// Faulted in user mode. Keeps its slot and memory until torn down.
    Broken,
}

/// One slot of the process table.
#[derive(Debug, Clone)]
pub struct Process {
    pub(crate) pid: Pid,
    pub(crate) state: ProcessState,
    pub(crate) space: Option<AddressSpace>,
    pub(crate) regs: RegState,
}

impl Process {
    const fn free(pid: Pid) -> Self {
        Self {
            pid,
            state: ProcessState::Free,
            space: None,
            regs: RegState::zeroed(),
        }
    }

    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    #[must_use]
    pub const fn is_runnable(&self) -> bool {
        matches!(self.state, ProcessState::Runnable)
    }

    /// The page table of this process; `None` for free slots.
    #[must_use]
    pub const fn space(&self) -> Option<AddressSpace> {
        self.space
    }

    /// Register state saved on the last kernel entry.
    #[must_use]
    pub const fn regs(&self) -> &RegState {
        &self.regs
    }
}

/// Map `page` at `va`, giving up the reference on `page` if that fails.
pub(crate) fn map_or_release<E>(
    mem: &mut PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
    page: PhysicalPage,
    perm: Permissions,
) -> Result<(), E>
where
    E: From<MapError> + From<FrameError>,
{
    if let Err(e) = space.try_map(mem, va, page, perm) {
        mem.release_4k(page)?;
        return Err(e.into());
    }
    Ok(())
}
