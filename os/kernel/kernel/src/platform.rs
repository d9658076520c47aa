//! The services the kernel core consumes from the machine.

use crate::Pid;
use crate::memshow::MemoryView;
use kernel_memory_addresses::VirtualAddress;
use kernel_syscall::RegState;
use kernel_vmem::AddressSpace;

/// Outcome of a kernel entry once control has been handed on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Dispatch {
    /// `activate` was called for this process.
    Run(Pid),
    /// No process is runnable and the configured idle limit was reached.
    Idle,
}

/// Hardware and user-interface collaborators of the kernel.
///
/// Implemented by whatever hosts the kernel: the boot code on hardware, the
/// simulator, or a test harness.
pub trait Platform {
    /// Transfer control into `pid` with the saved register state `regs`,
    /// running on the page table `space`.
    ///
    /// On hardware this loads CR3 and returns to user mode through the
    /// trampoline and never comes back; control re-enters the kernel through
    /// the next trap or system call.
    fn activate(&mut self, pid: Pid, regs: &RegState, space: AddressSpace);

    /// Acknowledge the timer interrupt at the interrupt controller.
    fn ack_timer(&mut self);

    /// Faulting address of the most recent page fault (CR2).
    fn fault_address(&self) -> VirtualAddress;

    /// Whether an operator asked to stop the machine.
    fn abort_requested(&mut self) -> bool {
        false
    }

    /// Advisory memory visualization. Ignored by default.
    fn show_memory(&mut self, _view: &MemoryView<'_>) {}
}
