use crate::task::{ProcessTable, map_or_release, teardown};
use crate::{ForkError, Kernel, Pid, Platform, ProcessState};
use kernel_alloc::PhysicalMemory;
use kernel_info::layout::MemoryLayout;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::{AddressSpace, FrameAlloc};
use log::info;

/// Duplicate `parent` into the first free slot.
///
/// Kernel mappings are copied verbatim. Read-only process pages are shared
/// by reference; writable ones are copied into fresh frames. On failure the
/// partially built child is torn down and its slot stays free.
pub fn fork<const N: usize>(
    mem: &mut PhysicalMemory,
    layout: &MemoryLayout,
    procs: &mut ProcessTable<N>,
    parent: Pid,
) -> Result<Pid, ForkError> {
    let parent_space = procs
        .get(parent)
        .and_then(|p| p.space)
        .ok_or(ForkError::NotLoaded(parent))?;
    let child = procs.first_free().ok_or(ForkError::NoSlot)?;
    let space = AddressSpace::allocate(mem).ok_or(ForkError::OutOfMemory)?;
    procs[child].space = Some(space);

    if let Err(e) = copy_space(mem, layout, parent_space, space) {
        teardown(mem, layout, &mut procs[child])?;
        return Err(e);
    }

    let mut regs = procs[parent].regs;
    regs.set_return(0);
    procs[child].regs = regs;
    procs[child].state = ProcessState::Runnable;
    procs[parent].regs.set_return(child.as_u64());
    Ok(child)
}

fn copy_space(
    mem: &mut PhysicalMemory,
    layout: &MemoryLayout,
    parent: AddressSpace,
    child: AddressSpace,
) -> Result<(), ForkError> {
    let end = VirtualAddress::new(layout.virtual_size);
    for va in parent.cursor(VirtualAddress::zero()).pages_until(end) {
        let Some(mapping) = parent.lookup(mem, va) else {
            continue;
        };

        if va.as_u64() < layout.proc_start {
            child.try_map(mem, va, mapping.page, mapping.perm)?;
        } else if mapping.perm.writable() {
            let page = mem.alloc_4k().ok_or(ForkError::OutOfMemory)?;
            mem.copy_frame(mapping.page, page);
            map_or_release::<ForkError>(mem, child, va, page, mapping.perm)?;
        } else {
            mem.retain_4k(mapping.page)?;
            map_or_release::<ForkError>(mem, child, va, mapping.page, mapping.perm)?;
        }
    }
    Ok(())
}

impl<P: Platform> Kernel<P> {
    /// Fork process `parent`; see [`fork`].
    ///
    /// On success the parent's return register holds the child pid and the
    /// child's holds zero.
    ///
    /// # Errors
    /// [`ForkError`] if no slot or not enough memory is available.
    pub fn fork(&mut self, parent: Pid) -> Result<Pid, ForkError> {
        let child = fork(
            &mut self.memory,
            &self.config.layout,
            &mut self.procs,
            parent,
        )?;
        info!("process {parent} forked process {child}");
        Ok(child)
    }
}
