//! Kernel state and bring-up.

use crate::memshow::MemoryViewer;
use crate::{Dispatch, KernelConfig, KernelHalt, Pid, Platform, ProcessTable, ProgramRegistry};
use crate::task::Process;
use alloc::string::ToString;
use alloc::vec::Vec;
use kernel_alloc::PhysicalMemory;
use kernel_info::layout::MemoryLayout;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use kernel_vmem::{AddressSpace, Permissions};
use log::{error, info};

/// The whole kernel: memory, processes, and the platform it runs on.
pub struct Kernel<P: Platform> {
    pub(crate) config: KernelConfig,
    pub(crate) memory: PhysicalMemory,
    pub(crate) kernel_space: AddressSpace,
    pub(crate) procs: ProcessTable,
    pub(crate) current: Pid,
    pub(crate) ticks: u64,
    pub(crate) viewer: MemoryViewer,
    pub(crate) platform: P,
}

impl<P: Platform> Kernel<P> {
    /// Set up physical memory and the kernel page table.
    ///
    /// The kernel page table identity-maps physical memory. Page 0 stays
    /// unmapped so null pointer accesses fault. The kernel region is
    /// kernel-only except for the console; everything above the process
    /// boundary is user accessible.
    ///
    /// # Errors
    /// [`KernelHalt::BootOutOfMemory`] if there is no frame for the root table.
    ///
    /// # Panics
    /// If physical memory is too small to hold the kernel page table.
    pub fn new(platform: P, config: KernelConfig) -> Result<Self, KernelHalt> {
        let mut memory = PhysicalMemory::new(&config.layout);
        let kernel_space =
            AddressSpace::allocate(&mut memory).ok_or(KernelHalt::BootOutOfMemory)?;

        let layout = &config.layout;
        for pa in (0..layout.physical_size).step_by(PAGE_SIZE as usize) {
            let perm = identity_permissions(layout, pa);
            kernel_space.map(
                &mut memory,
                VirtualAddress::new(pa),
                PhysicalAddress::new(pa).page(),
                perm,
            );
        }

        info!(
            "kernel page table ready, {} of {} frames free",
            memory.frames().free_count(),
            memory.frames().frame_count()
        );

        Ok(Self {
            config,
            memory,
            kernel_space,
            procs: ProcessTable::new(),
            current: Pid::KERNEL,
            ticks: 0,
            viewer: MemoryViewer::default(),
            platform,
        })
    }

    /// Load the initial processes and run the first one.
    ///
    /// With a `command` naming a registered program, only that program is
    /// loaded, as process 1. Without one, every registered program is
    /// loaded in registration order.
    ///
    /// # Errors
    /// A [`KernelHalt`] if a program is unknown, does not fit, or cannot be
    /// loaded.
    pub fn boot(
        &mut self,
        programs: &ProgramRegistry,
        command: Option<&str>,
    ) -> Result<Dispatch, KernelHalt> {
        let images: Vec<_> = match command {
            Some(name) => {
                let image = programs
                    .get(name)
                    .ok_or_else(|| KernelHalt::UnknownProgram(name.to_string()))?;
                alloc::vec![image]
            }
            None => programs.iter().collect(),
        };
        if images.len() >= self.procs.len() {
            return Err(KernelHalt::TooManyPrograms(images.len()));
        }

        for (slot, image) in images.into_iter().enumerate() {
            let pid = Pid::new(slot + 1);
            self.setup(pid, image).map_err(|source| {
                error!("cannot load `{}`: {source}", image.name());
                KernelHalt::Setup { pid, source }
            })?;
        }
        self.run(Pid::new(1))
    }

    /// Make `pid` current and hand it to the platform.
    ///
    /// # Errors
    /// - [`KernelHalt::NotRunnable`] if the process is not runnable.
    /// - [`KernelHalt::CorruptPageTable`] if its page table no longer maps
    ///   the kernel image and stack.
    pub fn run(&mut self, pid: Pid) -> Result<Dispatch, KernelHalt> {
        let space = self
            .procs
            .get(pid)
            .filter(|p| p.is_runnable())
            .and_then(Process::space)
            .ok_or(KernelHalt::NotRunnable(pid))?;
        self.current = pid;
        self.check_kernel_mappings(pid, space)?;

        self.platform.activate(pid, &self.procs[pid].regs, space);
        Ok(Dispatch::Run(pid))
    }

    /// The kernel image and stack must be identity-mapped, kernel-only.
    fn check_kernel_mappings(&self, pid: Pid, space: AddressSpace) -> Result<(), KernelHalt> {
        let layout = &self.config.layout;
        let image = layout.kernel_image.clone().step_by(PAGE_SIZE as usize);
        for va in image.chain([layout.kernel_stack_page()]).map(VirtualAddress::new) {
            let intact = space.lookup(&self.memory, va).is_some_and(|m| {
                m.page.base().as_u64() == va.as_u64() && m.perm == Permissions::KERNEL_RW
            });
            if !intact {
                error!("process {pid}: kernel page {va} is not mapped correctly");
                return Err(KernelHalt::CorruptPageTable { pid, va });
            }
        }
        Ok(())
    }

    pub(crate) fn check_abort(&mut self) -> Result<(), KernelHalt> {
        if self.platform.abort_requested() {
            error!("abort requested");
            return Err(KernelHalt::AbortRequested);
        }
        Ok(())
    }

    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The currently executing process.
    #[must_use]
    pub const fn current(&self) -> Pid {
        self.current
    }

    /// # Panics
    /// If `pid` is outside the process table.
    #[must_use]
    pub fn process(&self, pid: Pid) -> &Process {
        &self.procs[pid]
    }

    #[must_use]
    pub const fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    #[must_use]
    pub const fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    #[must_use]
    pub const fn kernel_space(&self) -> AddressSpace {
        self.kernel_space
    }

    /// Timer interrupts handled so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    pub const fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

fn identity_permissions(layout: &MemoryLayout, pa: u64) -> Permissions {
    if pa == 0 {
        Permissions::NONE
    } else if pa < layout.proc_start && pa != layout.console {
        Permissions::KERNEL_RW
    } else {
        Permissions::USER_RW
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_map_permissions() {
        let layout = MemoryLayout::default();
        assert_eq!(identity_permissions(&layout, 0), Permissions::NONE);
        assert_eq!(identity_permissions(&layout, 0x4_0000), Permissions::KERNEL_RW);
        assert_eq!(identity_permissions(&layout, 0xB_8000), Permissions::USER_RW);
        assert_eq!(identity_permissions(&layout, 0xB_9000), Permissions::KERNEL_RW);
        assert_eq!(identity_permissions(&layout, 0x10_0000), Permissions::USER_RW);
    }
}
