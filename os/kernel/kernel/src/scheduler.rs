//! Round-robin scheduling.
//!
//! The scan starts at the slot after the current process and wraps around,
//! ending with the current process itself. Any runnable process is
//! therefore found within one pass over the table.

use crate::task::ProcessTable;
use crate::{Dispatch, Kernel, KernelHalt, Pid, Platform};
use log::debug;

/// The `N` slots in scan order after `after`, ending with `after`.
pub fn scan_order<const N: usize>(after: Pid) -> impl Iterator<Item = Pid> {
    let start = after.as_usize();
    (1..=N).map(move |step| Pid::new((start + step) % N))
}

/// The first runnable process in scan order after `after`.
#[must_use]
pub fn next_runnable<const N: usize>(procs: &ProcessTable<N>, after: Pid) -> Option<Pid> {
    scan_order::<N>(after).find(|&pid| procs[pid].is_runnable())
}

impl<P: Platform> Kernel<P> {
    /// Run the next runnable process after the current one.
    ///
    /// While nothing is runnable this spins, refreshing the memory view and
    /// polling for an abort. With an idle limit configured it reports
    /// [`Dispatch::Idle`] after that many empty rounds instead.
    ///
    /// # Errors
    /// [`KernelHalt::AbortRequested`] if the platform asks to stop while idle,
    /// or any error of [`run`](Self::run).
    pub fn schedule(&mut self) -> Result<Dispatch, KernelHalt> {
        let mut spins: u32 = 0;
        loop {
            if let Some(pid) = next_runnable(&self.procs, self.current) {
                return self.run(pid);
            }

            spins = spins.wrapping_add(1);
            self.check_abort()?;
            let interval = self.config.memshow_spin_interval;
            if interval != 0 && spins % interval == 0 {
                debug!("no runnable process");
                self.show_memory();
            }
            if let Some(limit) = self.config.idle_spin_limit
                && spins >= limit.get()
            {
                debug!("idle after {spins} rounds");
                return Ok(Dispatch::Idle);
            }
        }
    }

    /// Continue the current process if it can still run, else schedule.
    pub(crate) fn resume(&mut self) -> Result<Dispatch, KernelHalt> {
        if self.procs[self.current].is_runnable() {
            self.run(self.current)
        } else {
            self.schedule()
        }
    }
}
