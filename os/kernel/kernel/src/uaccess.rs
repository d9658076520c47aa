//! Reading and writing process memory from the kernel.
//!
//! The `copy_*_user` functions perform the access with user privilege: each
//! page is checked the way the MMU would check it, and a denied access
//! reports the page-fault error code the hardware would raise. The kernel
//! itself uses the privileged variants, which only require a mapping.

use crate::{Kernel, Pid, Platform};
use alloc::string::String;
use alloc::vec::Vec;
use kernel_alloc::PhysicalMemory;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use kernel_vmem::{AddressSpace, MemoryAccess, PageFaultError};

/// A process memory access that would fault.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("{} at {va}: {} {}", .error.explain(), .error.operation(), .error.problem())]
pub struct UserFault {
    pub va: VirtualAddress,
    pub error: PageFaultError,
}

/// Write `bytes` to `va` as the process would.
///
/// Pages before the faulting one are written, like a `rep movsb` that faults
/// midway.
///
/// # Errors
/// [`UserFault`] on the first page the process may not write.
pub fn copy_to_user(
    mem: &mut PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
    bytes: &[u8],
) -> Result<(), UserFault> {
    write(mem, space, va, bytes, Some(MemoryAccess::USER_WRITE))
}

/// Read `buf.len()` bytes from `va` as the process would.
///
/// # Errors
/// [`UserFault`] on the first page the process may not read.
pub fn copy_from_user(
    mem: &PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
    buf: &mut [u8],
) -> Result<(), UserFault> {
    read(mem, space, va, buf, Some(MemoryAccess::USER_READ))
}

/// Read a NUL-terminated string of at most one page from `va`.
///
/// Invalid UTF-8 is replaced; a missing terminator ends the string at the
/// page limit.
///
/// # Errors
/// [`UserFault`] if a byte before the terminator is not readable.
#[allow(clippy::cast_possible_truncation)]
pub fn read_user_str(
    mem: &PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
) -> Result<String, UserFault> {
    let mut out = Vec::new();
    let mut at = va;
    while out.len() < PAGE_SIZE as usize {
        let room = (PAGE_SIZE - at.offset()) as usize;
        let mut chunk = alloc::vec![0; room.min(PAGE_SIZE as usize - out.len())];
        copy_from_user(mem, space, at, &mut chunk)?;
        if let Some(nul) = chunk.iter().position(|&b| b == 0) {
            out.extend_from_slice(&chunk[..nul]);
            break;
        }
        out.extend_from_slice(&chunk);
        at += chunk.len() as u64;
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Privileged write; only requires the pages to be mapped.
pub(crate) fn kernel_write(
    mem: &mut PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
    bytes: &[u8],
) -> Result<(), UserFault> {
    write(mem, space, va, bytes, None)
}

/// Privileged fill of `len` bytes at `va` with `byte`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn kernel_fill(
    mem: &mut PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
    len: u64,
    byte: u8,
) -> Result<(), UserFault> {
    let page = [byte; PAGE_SIZE as usize];
    let mut at = va;
    let mut left = len;
    while left > 0 {
        let n = left.min(PAGE_SIZE - at.offset());
        write(mem, space, at, &page[..n as usize], None)?;
        at += n;
        left -= n;
    }
    Ok(())
}

fn resolve(
    mem: &PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
    access: Option<MemoryAccess>,
) -> Result<PhysicalAddress, UserFault> {
    match access {
        Some(access) => space
            .check_access(mem, va, access)
            .map_err(|error| UserFault { va, error }),
        None => space.translate(mem, va).ok_or(UserFault {
            va,
            error: PageFaultError::for_access(MemoryAccess::KERNEL_WRITE, false),
        }),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn page_chunk(va: VirtualAddress, remaining: usize) -> usize {
    remaining.min((PAGE_SIZE - va.offset()) as usize)
}

fn write(
    mem: &mut PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
    bytes: &[u8],
    access: Option<MemoryAccess>,
) -> Result<(), UserFault> {
    let mut done = 0;
    while done < bytes.len() {
        let at = va + done as u64;
        let n = page_chunk(at, bytes.len() - done);
        let pa = resolve(mem, space, at, access)?;
        mem.write(pa, &bytes[done..done + n]);
        done += n;
    }
    Ok(())
}

fn read(
    mem: &PhysicalMemory,
    space: AddressSpace,
    va: VirtualAddress,
    buf: &mut [u8],
    access: Option<MemoryAccess>,
) -> Result<(), UserFault> {
    let mut done = 0;
    while done < buf.len() {
        let at = va + done as u64;
        let n = page_chunk(at, buf.len() - done);
        let pa = resolve(mem, space, at, access)?;
        mem.read(pa, &mut buf[done..done + n]);
        done += n;
    }
    Ok(())
}

impl<P: Platform> Kernel<P> {
    /// Write into the memory of `pid` the way the process itself would.
    ///
    /// # Errors
    /// [`UserFault`] with the fault the process would take.
    pub fn write_user(&mut self, pid: Pid, va: VirtualAddress, bytes: &[u8]) -> Result<(), UserFault> {
        let space = self.user_space(pid, va, MemoryAccess::USER_WRITE)?;
        copy_to_user(&mut self.memory, space, va, bytes)
    }

    /// Read from the memory of `pid` the way the process itself would.
    ///
    /// # Errors
    /// [`UserFault`] with the fault the process would take.
    pub fn read_user(&self, pid: Pid, va: VirtualAddress, buf: &mut [u8]) -> Result<(), UserFault> {
        let space = self.user_space(pid, va, MemoryAccess::USER_READ)?;
        copy_from_user(&self.memory, space, va, buf)
    }

    fn user_space(
        &self,
        pid: Pid,
        va: VirtualAddress,
        access: MemoryAccess,
    ) -> Result<AddressSpace, UserFault> {
        self.procs
            .get(pid)
            .and_then(|p| p.space())
            .ok_or(UserFault {
                va,
                error: PageFaultError::for_access(access, false),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::layout::MemoryLayout;
    use kernel_vmem::{FrameAlloc, Permissions};

    const VA: u64 = 0x10_0000;

    fn setup(perm: Permissions) -> (PhysicalMemory, AddressSpace) {
        let mut mem = PhysicalMemory::new(&MemoryLayout::default());
        let space = AddressSpace::allocate(&mut mem).unwrap();
        for i in 0..2 {
            let page = mem.alloc_4k().unwrap();
            space.map(&mut mem, VirtualAddress::new(VA + i * PAGE_SIZE), page, perm);
        }
        (mem, space)
    }

    #[test]
    fn copies_across_page_boundary() {
        let (mut mem, space) = setup(Permissions::USER_RW);
        let va = VirtualAddress::new(VA + PAGE_SIZE - 2);
        copy_to_user(&mut mem, space, va, b"abcd").unwrap();

        let mut buf = [0; 4];
        copy_from_user(&mem, space, va, &mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn write_to_read_only_page_is_a_protection_fault() {
        let (mut mem, space) = setup(Permissions::USER_RO);
        let err = copy_to_user(&mut mem, space, VirtualAddress::new(VA), b"x").unwrap_err();
        assert_eq!(err.va, VirtualAddress::new(VA));
        assert!(err.error.present());
        assert!(err.error.write());
        assert!(err.error.user());
    }

    #[test]
    fn kernel_write_ignores_protection() {
        let (mut mem, space) = setup(Permissions::USER_RO);
        kernel_write(&mut mem, space, VirtualAddress::new(VA), b"ok").unwrap();
        let mut buf = [0; 2];
        copy_from_user(&mem, space, VirtualAddress::new(VA), &mut buf).unwrap();
        assert_eq!(&buf, b"ok");
    }

    #[test]
    fn unmapped_read_is_a_missing_page() {
        let (mem, space) = setup(Permissions::USER_RW);
        let mut buf = [0; 1];
        let err = copy_from_user(&mem, space, VirtualAddress::new(0x20_0000), &mut buf)
            .unwrap_err();
        assert!(!err.error.present());
        assert!(!err.error.write());
    }

    #[test]
    fn reads_nul_terminated_strings() {
        let (mut mem, space) = setup(Permissions::USER_RW);
        let va = VirtualAddress::new(VA + PAGE_SIZE - 3);
        copy_to_user(&mut mem, space, va, b"oops\0tail").unwrap();
        assert_eq!(read_user_str(&mem, space, va).unwrap(), "oops");
    }

    #[test]
    fn strings_are_capped_at_one_page() {
        let (mut mem, space) = setup(Permissions::USER_RW);
        kernel_fill(&mut mem, space, VirtualAddress::new(VA), 2 * PAGE_SIZE, b'a').unwrap();
        let s = read_user_str(&mem, space, VirtualAddress::new(VA + 10)).unwrap();
        assert_eq!(s.len(), PAGE_SIZE as usize);
    }
}
