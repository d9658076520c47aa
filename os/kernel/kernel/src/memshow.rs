//! Advisory memory visualization.
//!
//! On every kernel entry the platform is shown a [`MemoryView`]: the state
//! of every physical frame plus the mappings of one process. The displayed
//! process changes every half second of timer ticks.

use crate::scheduler::scan_order;
use crate::task::{NPROC, ProcessTable};
use crate::{Kernel, Pid, Platform};
use core::ops::Range;
use kernel_alloc::{FrameInfo, PhysicalMemory};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::{AddressSpace, Mapping};

/// Snapshot handed to [`Platform::show_memory`].
pub struct MemoryView<'a> {
    ticks: u64,
    memory: &'a PhysicalMemory,
    shown: Option<(Pid, AddressSpace)>,
    user: Range<u64>,
}

impl<'a> MemoryView<'a> {
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Every physical frame, in address order.
    pub fn frames(&self) -> impl Iterator<Item = FrameInfo> + 'a {
        self.memory.frames().iter()
    }

    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.memory.frames().free_count()
    }

    /// The process whose mappings are shown, if any process is live.
    #[must_use]
    pub fn shown_pid(&self) -> Option<Pid> {
        self.shown.map(|(pid, _)| pid)
    }

    /// Present mappings of the shown process above the process boundary.
    pub fn mappings(&self) -> impl Iterator<Item = Mapping> + 'a {
        let memory = self.memory;
        let start = VirtualAddress::new(self.user.start);
        let end = VirtualAddress::new(self.user.end);
        self.shown
            .into_iter()
            .flat_map(move |(_, space)| {
                space
                    .cursor(start)
                    .pages_until(end)
                    .map(move |va| (space, va))
            })
            .filter_map(move |(space, va)| space.lookup(memory, va))
    }
}

/// Chooses which process the memory view displays.
#[derive(Debug, Default)]
pub struct MemoryViewer {
    shown: Pid,
    switched_at: u64,
}

impl MemoryViewer {
    /// The process to display at `ticks`, rotating every `hz / 2` ticks.
    pub fn select<const N: usize>(
        &mut self,
        procs: &ProcessTable<N>,
        ticks: u64,
        hz: u32,
    ) -> Option<(Pid, AddressSpace)> {
        let period = u64::from(hz / 2).max(1);
        let displayable = |pid: Pid| procs.get(pid).and_then(|p| p.space()).map(|s| (pid, s));

        let due = ticks.saturating_sub(self.switched_at) >= period;
        if !due {
            if let Some(shown) = displayable(self.shown) {
                return Some(shown);
            }
        }

        self.switched_at = ticks;
        let next = scan_order::<N>(self.shown).find_map(displayable)?;
        self.shown = next.0;
        Some(next)
    }
}

impl<P: Platform> Kernel<P> {
    pub(crate) fn show_memory(&mut self) {
        let shown = self
            .viewer
            .select::<NPROC>(&self.procs, self.ticks, self.config.hz);
        let layout = &self.config.layout;
        let view = MemoryView {
            ticks: self.ticks,
            memory: &self.memory,
            shown,
            user: layout.proc_start..layout.virtual_size,
        };
        self.platform.show_memory(&view);
    }
}
