use crate::{Dispatch, Kernel, KernelHalt, Platform};

/// Vector of the periodic timer interrupt.
pub const TIMER_VECTOR: u64 = 0x20; // 32

impl<P: Platform> Kernel<P> {
    /// Count the tick, acknowledge it and switch to the next process.
    pub(crate) fn timer_tick(&mut self) -> Result<Dispatch, KernelHalt> {
        self.ticks += 1;
        self.platform.ack_timer();
        self.schedule()
    }
}
