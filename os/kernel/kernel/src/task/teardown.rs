use crate::task::{Process, ProcessState};
use crate::{Kernel, KernelHalt, Pid, Platform};
use alloc::vec::Vec;
use kernel_alloc::PhysicalMemory;
use kernel_info::layout::MemoryLayout;
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
use kernel_syscall::RegState;
use kernel_vmem::{FrameAlloc, FrameError};
use log::debug;

/// Return every frame owned by `proc` and free its slot.
///
/// Data frames at or above the process boundary lose one reference; they
/// may still be mapped by a sibling. Table frames are never shared and are
/// released unconditionally, the root last. The kernel mappings below the
/// boundary are not refcounted and are left alone.
pub fn teardown(
    mem: &mut PhysicalMemory,
    layout: &MemoryLayout,
    proc: &mut Process,
) -> Result<(), FrameError> {
    if let Some(space) = proc.space.take() {
        let start = space.cursor(VirtualAddress::new(layout.proc_start));
        for va in start.pages_until(VirtualAddress::new(layout.virtual_size)) {
            if let Some(mapping) = space.lookup(mem, va) {
                mem.release_4k(mapping.page)?;
            }
        }

        let tables: Vec<PhysicalPage> = space.table_frames(mem).map(|t| t.page).collect();
        for page in tables {
            mem.release_4k(page)?;
        }
        mem.release_4k(space.root_page())?;
    }

    proc.state = ProcessState::Free;
    proc.regs = RegState::zeroed();
    Ok(())
}

impl<P: Platform> Kernel<P> {
    /// Reclaim process `pid` and mark its slot free.
    ///
    /// This is how `EXIT` ends a process and how a broken process is
    /// cleared from its slot.
    ///
    /// # Errors
    /// [`KernelHalt::Frame`] if frame accounting is inconsistent.
    pub fn teardown(&mut self, pid: Pid) -> Result<(), KernelHalt> {
        let Some(proc) = self.procs.get_mut(pid).filter(|_| pid != Pid::KERNEL) else {
            return Err(KernelHalt::NotRunnable(pid));
        };
        teardown(&mut self.memory, &self.config.layout, proc)?;
        debug!(
            "process {pid} torn down, {} frames free",
            self.memory.frames().free_count()
        );
        Ok(())
    }
}
