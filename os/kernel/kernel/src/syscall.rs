//! System call entry.
//!
//! The number arrives in `rax`, the argument in `rdi`, and the result goes
//! back in `rax`. Recoverable failures return [`SYSCALL_FAILED`].

use crate::task::map_or_release;
use crate::uaccess::read_user_str;
use crate::{Dispatch, ForkError, Kernel, KernelHalt, PageAllocError, Pid, Platform};
use alloc::string::String;
use kernel_memory_addresses::VirtualAddress;
use kernel_syscall::{RegState, SYSCALL_FAILED, Sysno, UnknownSyscall};
use kernel_vmem::{FrameAlloc, Permissions, PhysMapper};
use log::{debug, error};

/// A decoded system call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Syscall {
    GetPid,
    Yield,
    /// Halt the machine. `message` points at a NUL-terminated string or is null.
    Panic { message: VirtualAddress },
    /// Map a fresh zeroed page at `addr`.
    PageAlloc { addr: VirtualAddress },
    Fork,
    Exit,
}

impl Syscall {
    /// Decode the call in `regs`.
    ///
    /// # Errors
    /// [`UnknownSyscall`] for numbers outside the ABI.
    pub fn decode(regs: &RegState) -> Result<Self, UnknownSyscall> {
        let arg = VirtualAddress::new(regs.arg0());
        Ok(match Sysno::try_from(regs.syscall_number())? {
            Sysno::GetPid => Self::GetPid,
            Sysno::Yield => Self::Yield,
            Sysno::Panic => Self::Panic { message: arg },
            Sysno::PageAlloc => Self::PageAlloc { addr: arg },
            Sysno::Fork => Self::Fork,
            Sysno::Exit => Self::Exit,
        })
    }
}

impl<P: Platform> Kernel<P> {
    /// Handle a system call made by the current process.
    ///
    /// # Errors
    /// A [`KernelHalt`] for unknown calls, `PANIC`, abort requests and
    /// broken frame accounting.
    pub fn syscall(&mut self, regs: &RegState) -> Result<Dispatch, KernelHalt> {
        let pid = self.current;
        self.procs[pid].regs = *regs;
        self.show_memory();
        self.check_abort()?;

        let call = Syscall::decode(regs).map_err(|source| {
            error!("process {pid}: {source}");
            KernelHalt::UnexpectedSyscall { pid, source }
        })?;
        debug!("process {pid}: {call:?}");

        match call {
            Syscall::GetPid => self.procs[pid].regs.set_return(pid.as_u64()),
            Syscall::Yield => {
                self.procs[pid].regs.set_return(0);
                return self.schedule();
            }
            Syscall::Panic { message } => {
                let message = self.panic_message(pid, message);
                error!(
                    "process {pid} panicked: {}",
                    message.as_deref().unwrap_or("(no message)")
                );
                return Err(KernelHalt::PanicRequested { pid, message });
            }
            Syscall::PageAlloc { addr } => {
                let result = match self.page_alloc(pid, addr) {
                    Ok(()) => 0,
                    Err(PageAllocError::Frame(e)) => return Err(e.into()),
                    Err(e) => {
                        debug!("process {pid}: page_alloc({addr}) failed: {e}");
                        SYSCALL_FAILED
                    }
                };
                self.procs[pid].regs.set_return(result);
            }
            Syscall::Fork => match self.fork(pid) {
                Ok(_) => {}
                Err(ForkError::Frame(e)) => return Err(e.into()),
                Err(e) => {
                    debug!("process {pid}: fork failed: {e}");
                    self.procs[pid].regs.set_return(SYSCALL_FAILED);
                }
            },
            Syscall::Exit => {
                self.teardown(pid)?;
                return self.schedule();
            }
        }
        self.resume()
    }

    /// Map a fresh zeroed user page at `addr` into `pid`.
    ///
    /// A page already mapped there is replaced; the reference on the old
    /// frame is dropped once the new one is in place.
    ///
    /// # Errors
    /// - [`PageAllocError::InvalidAddress`] for unaligned addresses or
    ///   addresses outside process memory; nothing is allocated.
    /// - [`PageAllocError::OutOfMemory`] if no frame or page table is left;
    ///   nothing is leaked.
    pub fn page_alloc(&mut self, pid: Pid, addr: VirtualAddress) -> Result<(), PageAllocError> {
        if !self.config.layout.is_user_address(addr) || !addr.is_page_aligned() {
            return Err(PageAllocError::InvalidAddress(addr));
        }
        let space = self
            .procs
            .get(pid)
            .and_then(|p| p.space())
            .ok_or(PageAllocError::NotLoaded(pid))?;

        let old = space.lookup(&self.memory, addr).map(|m| m.page);
        let page = self
            .memory
            .alloc_4k()
            .ok_or(PageAllocError::OutOfMemory)?;
        self.memory.zero_frame(page);
        map_or_release::<PageAllocError>(&mut self.memory, space, addr, page, Permissions::USER_RW)?;
        if let Some(old) = old {
            self.memory.release_4k(old)?;
        }
        Ok(())
    }

    fn panic_message(&self, pid: Pid, message: VirtualAddress) -> Option<String> {
        if message.as_u64() == 0 {
            return None;
        }
        let space = self.procs[pid].space()?;
        read_user_str(&self.memory, space, message).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_calls() {
        let regs = RegState::zeroed();
        assert_eq!(
            Syscall::decode(&regs.with_syscall(Sysno::GetPid, 0)),
            Ok(Syscall::GetPid)
        );
        assert_eq!(
            Syscall::decode(&regs.with_syscall(Sysno::PageAlloc, 0x10_3000)),
            Ok(Syscall::PageAlloc {
                addr: VirtualAddress::new(0x10_3000)
            })
        );
        assert_eq!(
            Syscall::decode(&regs.with_syscall(Sysno::Panic, 0)),
            Ok(Syscall::Panic {
                message: VirtualAddress::zero()
            })
        );
    }

    #[test]
    fn rejects_unknown_numbers() {
        let regs = RegState::zeroed().with_syscall_raw(42, 0);
        assert_eq!(Syscall::decode(&regs), Err(UnknownSyscall(42)));
    }
}
