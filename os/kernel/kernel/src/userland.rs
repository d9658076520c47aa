//! Loading program images into process slots.

use crate::task::{Process, ProcessState, map_or_release, teardown};
use crate::uaccess::{kernel_fill, kernel_write};
use crate::{Kernel, Pid, Platform, ProgramImage, ProgramSegment, SetupError};
use kernel_alloc::PhysicalMemory;
use kernel_info::layout::MemoryLayout;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, align_up};
use kernel_syscall::RegState;
use kernel_vmem::{AddressSpace, FrameAlloc, PhysMapper, Permissions};
use log::info;

/// Build a fresh address space for `proc` and load `image` into it.
///
/// On failure everything allocated so far is released and the slot stays
/// free.
pub fn setup(
    mem: &mut PhysicalMemory,
    kernel_space: AddressSpace,
    layout: &MemoryLayout,
    proc: &mut Process,
    image: &ProgramImage,
) -> Result<(), SetupError> {
    if proc.state != ProcessState::Free || proc.space.is_some() {
        return Err(SetupError::SlotInUse(proc.pid));
    }

    let space = AddressSpace::allocate(mem).ok_or(SetupError::OutOfMemory)?;
    proc.space = Some(space);
    if let Err(e) = load(mem, kernel_space, layout, space, image) {
        teardown(mem, layout, proc)?;
        return Err(e);
    }

    proc.regs = RegState::user_entry(image.entry().as_u64(), layout.virtual_size);
    proc.state = ProcessState::Runnable;
    Ok(())
}

fn load(
    mem: &mut PhysicalMemory,
    kernel_space: AddressSpace,
    layout: &MemoryLayout,
    space: AddressSpace,
    image: &ProgramImage,
) -> Result<(), SetupError> {
    let boundary = VirtualAddress::new(layout.proc_start);
    for va in kernel_space.cursor(VirtualAddress::zero()).pages_until(boundary) {
        if let Some(mapping) = kernel_space.lookup(mem, va) {
            space.try_map(mem, va, mapping.page, mapping.perm)?;
        }
    }

    for segment in image.segments() {
        load_segment(mem, layout, space, segment)?;
    }

    let stack = mem.alloc_4k().ok_or(SetupError::OutOfMemory)?;
    mem.zero_frame(stack);
    map_or_release(mem, space, layout.user_stack_page(), stack, Permissions::USER_RW)
}

fn load_segment(
    mem: &mut PhysicalMemory,
    layout: &MemoryLayout,
    space: AddressSpace,
    segment: &ProgramSegment,
) -> Result<(), SetupError> {
    let start = segment.va;
    let end = start
        .as_u64()
        .checked_add(segment.size)
        .filter(|&end| {
            start.as_u64() >= layout.proc_start && end <= layout.user_stack_page().as_u64()
        })
        .ok_or(SetupError::SegmentOutOfRange(start))?;

    let perm = if segment.writable {
        Permissions::USER_RW
    } else {
        Permissions::USER_RO
    };

    let last = VirtualAddress::new(align_up(end, PAGE_SIZE));
    for va in space.cursor(start).pages_until(last) {
        match space.lookup(mem, va) {
            // Shared with an earlier segment.
            Some(m) if segment.writable && !m.perm.writable() => {
                space.try_map(mem, va, m.page, Permissions::USER_RW)?;
            }
            Some(_) => {}
            None => {
                let page = mem.alloc_4k().ok_or(SetupError::OutOfMemory)?;
                mem.zero_frame(page);
                map_or_release::<SetupError>(mem, space, va, page, perm)?;
            }
        }
    }

    let unmapped = |f: crate::uaccess::UserFault| SetupError::Unmapped(f.va);
    kernel_fill(mem, space, start, segment.size, 0).map_err(unmapped)?;
    kernel_write(mem, space, start, &segment.data).map_err(unmapped)
}

impl<P: Platform> Kernel<P> {
    /// Load `image` into the free slot `pid` and make it runnable.
    ///
    /// # Errors
    /// [`SetupError`] if the slot is taken or reserved, the image does not
    /// fit into process memory, or memory runs out. Nothing is leaked on
    /// failure.
    pub fn setup(&mut self, pid: Pid, image: &ProgramImage) -> Result<(), SetupError> {
        if pid == Pid::KERNEL {
            return Err(SetupError::Reserved(pid));
        }
        let proc = self.procs.get_mut(pid).ok_or(SetupError::Reserved(pid))?;
        setup(
            &mut self.memory,
            self.kernel_space,
            &self.config.layout,
            proc,
            image,
        )?;
        info!("loaded `{}` as process {pid}", image.name());
        Ok(())
    }
}
