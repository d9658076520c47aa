use crate::{Kernel, KernelHalt, Pid, Platform, ProcessState};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::PageFaultError;
use log::{error, warn};

/// Vector of the page fault exception.
pub const PAGE_FAULT_VECTOR: u64 = 0x0E; // 14

impl<P: Platform> Kernel<P> {
    /// A user fault breaks the faulting process; a kernel fault halts.
    pub(crate) fn page_fault(
        &mut self,
        pid: Pid,
        rip: u64,
        addr: VirtualAddress,
        error: PageFaultError,
    ) -> Result<(), KernelHalt> {
        if !error.user() {
            error!(
                "kernel page fault for {addr} ({} {}, rip={rip:#x}): {}",
                error.operation(),
                error.problem(),
                error.explain()
            );
            return Err(KernelHalt::KernelPageFault { addr, rip, error });
        }

        warn!(
            "process {pid} page fault for {addr} ({} {}, rip={rip:#x})",
            error.operation(),
            error.problem()
        );
        self.procs[pid].state = ProcessState::Broken;
        Ok(())
    }
}
