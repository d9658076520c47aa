use crate::Pid;
use alloc::string::String;
use kernel_memory_addresses::VirtualAddress;
use kernel_syscall::UnknownSyscall;
use kernel_vmem::{FrameError, MapError, PageFaultError};

/// Conditions that stop the whole machine.
#[derive(Debug, thiserror::Error)]
pub enum KernelHalt {
    #[error("kernel page fault on {addr} ({} {}, rip={rip:#x})", .error.operation(), .error.problem())]
    KernelPageFault {
        addr: VirtualAddress,
        rip: u64,
        error: PageFaultError,
    },
    #[error("unexpected exception {vector} (error code {errcode:#x})")]
    UnexpectedException { vector: u64, errcode: u64 },
    #[error("process {pid}: {source}")]
    UnexpectedSyscall { pid: Pid, source: UnknownSyscall },
    #[error("process {pid} requested a panic: {}", .message.as_deref().unwrap_or("(no message)"))]
    PanicRequested { pid: Pid, message: Option<String> },
    #[error("frame accounting violated: {0}")]
    Frame(#[from] FrameError),
    #[error("cannot set up process {pid}: {source}")]
    Setup { pid: Pid, source: SetupError },
    #[error("process {0} is not runnable")]
    NotRunnable(Pid),
    #[error("page table of process {pid} does not map kernel page {va}")]
    CorruptPageTable { pid: Pid, va: VirtualAddress },
    #[error("unknown program `{0}`")]
    UnknownProgram(String),
    #[error("{0} programs do not fit into the process table")]
    TooManyPrograms(usize),
    #[error("out of physical memory while building the kernel page table")]
    BootOutOfMemory,
    #[error("abort requested")]
    AbortRequested,
}

/// Failure to load a program into a process slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SetupError {
    #[error("process slot {0} is in use")]
    SlotInUse(Pid),
    #[error("process slot {0} is reserved")]
    Reserved(Pid),
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("segment at {0} does not fit into process memory")]
    SegmentOutOfRange(VirtualAddress),
    #[error("segment page {0} is not mapped")]
    Unmapped(VirtualAddress),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Failure of `FORK`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ForkError {
    #[error("no free process slot")]
    NoSlot,
    #[error("process {0} has no address space")]
    NotLoaded(Pid),
    #[error("out of physical memory")]
    OutOfMemory,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Failure of `PAGE_ALLOC`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PageAllocError {
    #[error("{0} is not a page-aligned user address")]
    InvalidAddress(VirtualAddress),
    #[error("process {0} has no address space")]
    NotLoaded(Pid),
    #[error("out of physical memory")]
    OutOfMemory,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl From<MapError> for SetupError {
    fn from(_: MapError) -> Self {
        Self::OutOfMemory
    }
}

impl From<MapError> for ForkError {
    fn from(_: MapError) -> Self {
        Self::OutOfMemory
    }
}

impl From<MapError> for PageAllocError {
    fn from(_: MapError) -> Self {
        Self::OutOfMemory
    }
}
