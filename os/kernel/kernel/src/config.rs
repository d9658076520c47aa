//! Runtime configuration of the kernel.

use core::num::NonZeroU32;
use kernel_info::layout::MemoryLayout;
use kernel_info::memory::HZ;

/// Number of idle scheduler rounds between two memory view refreshes.
pub const MEMSHOW_SPIN_INTERVAL: u32 = 4096;

/// Tunables the kernel reads at runtime.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct KernelConfig {
    /// Physical and virtual memory layout.
    pub layout: MemoryLayout,
    /// Timer interrupts per second; the memory view rotates every `hz / 2` ticks.
    pub hz: u32,
    /// Idle rounds between memory view refreshes while nothing is runnable.
    pub memshow_spin_interval: u32,
    /// Stop idling after this many empty scheduler rounds and report
    /// [`Dispatch::Idle`](crate::Dispatch::Idle). `None` spins until a
    /// process becomes runnable or an abort is requested.
    pub idle_spin_limit: Option<NonZeroU32>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            layout: MemoryLayout::default(),
            hz: HZ,
            memshow_spin_interval: MEMSHOW_SPIN_INTERVAL,
            idle_spin_limit: None,
        }
    }
}

impl KernelConfig {
    /// Use `layout` instead of the default machine.
    #[must_use]
    pub fn with_layout(self, layout: MemoryLayout) -> Self {
        Self { layout, ..self }
    }

    /// Give up idling after `rounds` empty scheduler rounds.
    #[must_use]
    pub fn with_idle_spin_limit(self, rounds: NonZeroU32) -> Self {
        Self {
            idle_spin_limit: Some(rounds),
            ..self
        }
    }
}
