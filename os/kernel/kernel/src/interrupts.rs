//! Exception entry.
//!
//! Every trap other than the system call gate arrives here with the register
//! state the trampoline saved. The vector selects a [`Trap`]; each kind has
//! its own handler in a submodule.

pub mod page_fault;
pub mod timer;

pub use page_fault::PAGE_FAULT_VECTOR;
pub use timer::TIMER_VECTOR;

use crate::{Dispatch, Kernel, KernelHalt, Platform};
use kernel_memory_addresses::VirtualAddress;
use kernel_syscall::RegState;
use kernel_vmem::PageFaultError;
use log::error;

/// A decoded hardware trap.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trap {
    Timer,
    PageFault {
        addr: VirtualAddress,
        error: PageFaultError,
    },
    Unexpected {
        vector: u64,
        errcode: u64,
    },
}

impl Trap {
    /// Decode the trap recorded in `regs`. `fault_address` is only read for
    /// page faults.
    pub fn decode(regs: &RegState, fault_address: impl FnOnce() -> VirtualAddress) -> Self {
        match regs.intno {
            TIMER_VECTOR => Self::Timer,
            PAGE_FAULT_VECTOR => Self::PageFault {
                addr: fault_address(),
                error: PageFaultError::from_bits(regs.errcode),
            },
            vector => Self::Unexpected {
                vector,
                errcode: regs.errcode,
            },
        }
    }

    /// Whether this is a fault raised by kernel code.
    #[must_use]
    pub const fn is_kernel_fault(&self) -> bool {
        matches!(self, Self::PageFault { error, .. } if !error.user())
    }
}

impl<P: Platform> Kernel<P> {
    /// Handle a hardware trap taken while the current process ran.
    ///
    /// # Errors
    /// A [`KernelHalt`] for kernel-mode page faults, unexpected vectors and
    /// abort requests.
    pub fn exception(&mut self, regs: &RegState) -> Result<Dispatch, KernelHalt> {
        let pid = self.current;
        self.procs[pid].regs = *regs;

        let trap = Trap::decode(regs, || self.platform.fault_address());
        if !trap.is_kernel_fault() {
            self.show_memory();
        }
        self.check_abort()?;

        match trap {
            Trap::Timer => return self.timer_tick(),
            Trap::PageFault { addr, error } => self.page_fault(pid, regs.rip, addr, error)?,
            Trap::Unexpected { vector, errcode } => {
                error!("process {pid}: unexpected exception {vector} at rip={:#x}", regs.rip);
                return Err(KernelHalt::UnexpectedException { vector, errcode });
            }
        }
        self.resume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::MemoryAccess;

    #[test]
    fn decodes_vectors() {
        let regs = RegState::zeroed();
        let no_fault = || -> VirtualAddress { unreachable!() };

        assert_eq!(Trap::decode(&regs.with_trap(32, 0), no_fault), Trap::Timer);
        assert_eq!(
            Trap::decode(&regs.with_trap(6, 0), no_fault),
            Trap::Unexpected {
                vector: 6,
                errcode: 0
            }
        );

        let code = PageFaultError::for_access(MemoryAccess::USER_WRITE, true);
        let trap = Trap::decode(&regs.with_trap(14, code.into_bits()), || {
            VirtualAddress::new(0x10_0000)
        });
        assert_eq!(
            trap,
            Trap::PageFault {
                addr: VirtualAddress::new(0x10_0000),
                error: code
            }
        );
        assert!(!trap.is_kernel_fault());
    }

    #[test]
    fn kernel_faults_lack_the_user_bit() {
        let code = PageFaultError::for_access(MemoryAccess::KERNEL_READ, false);
        let trap = Trap::decode(
            &RegState::zeroed().with_trap(PAGE_FAULT_VECTOR, code.into_bits()),
            VirtualAddress::zero,
        );
        assert!(trap.is_kernel_fault());
    }
}
