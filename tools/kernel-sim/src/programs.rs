//! Built-in user programs.
//!
//! The kernel only sees their images; what they do is emulated here, one
//! action per step, from the register state the kernel resumes them with.

use kernel::{ProgramImage, ProgramRegistry, SYSCALL_FAILED, Sysno};
use kernel_info::memory::{MEMSIZE_VIRTUAL, PROC_START_ADDR};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};

/// First heap page of every program.
const HEAP_START: u64 = PROC_START_ADDR + 0x10_000;
/// The heap ends below the stack page.
const HEAP_END: u64 = MEMSIZE_VIRTUAL - PAGE_SIZE;
/// Pages `exiter` allocates before it exits.
const EXITER_PAGES: u32 = 4;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Program {
    /// Allocates heap pages forever, yielding in between.
    Allocator,
    /// Forks once, then behaves like `allocator`.
    Forker,
    /// Allocates a few pages, then exits.
    Exiter,
}

impl Program {
    pub const ALL: [Self; 3] = [Self::Allocator, Self::Forker, Self::Exiter];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Allocator => "allocator",
            Self::Forker => "forker",
            Self::Exiter => "exiter",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// A two-page image: code, then a writable page holding the name.
    fn image(self) -> ProgramImage {
        let code = VirtualAddress::new(PROC_START_ADDR);
        ProgramImage::builder(self.name())
            .code(code, &[0xCD, 0x80, 0xEB, 0xFC]) // int 0x80; jmp $-2
            .data(code + PAGE_SIZE, self.name().as_bytes())
            .build()
    }
}

/// Registry of every built-in program.
pub fn registry() -> ProgramRegistry {
    Program::ALL.into_iter().map(Program::image).collect()
}

/// One thing a program does before the kernel regains control.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Action {
    Syscall(Sysno, u64),
    /// Store one byte; may fault.
    Store(VirtualAddress, u8),
}

/// Emulated user state of one process.
#[derive(Debug, Clone)]
pub struct UserTask {
    program: Program,
    heap: u64,
    allocated: u32,
    pending: Option<Sysno>,
    forked: bool,
    touch: Option<VirtualAddress>,
    yield_next: bool,
}

impl UserTask {
    pub const fn new(program: Program) -> Self {
        Self {
            program,
            heap: HEAP_START,
            allocated: 0,
            pending: None,
            forked: false,
            touch: None,
            yield_next: false,
        }
    }

    pub const fn program(&self) -> Program {
        self.program
    }

    /// The state of the child after this task forked.
    pub fn forked_child(&self) -> Self {
        Self {
            pending: None,
            ..self.clone()
        }
    }

    /// Consume the result of the last system call, found in `rax`.
    pub fn resume(&mut self, rax: u64) {
        match self.pending.take() {
            Some(Sysno::PageAlloc) if rax == SYSCALL_FAILED => self.heap = HEAP_END,
            Some(Sysno::PageAlloc) => {
                self.touch = Some(VirtualAddress::new(self.heap));
                self.yield_next = true;
                self.heap += PAGE_SIZE;
                self.allocated += 1;
            }
            _ => {}
        }
    }

    /// The next action of process `pid`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn step(&mut self, pid: u64) -> Action {
        if let Some(va) = self.touch.take() {
            return Action::Store(va, pid as u8);
        }

        let call = if self.yield_next {
            self.yield_next = false;
            (Sysno::Yield, 0)
        } else {
            match self.program {
                Program::Forker if !self.forked => {
                    self.forked = true;
                    (Sysno::Fork, 0)
                }
                Program::Exiter if self.allocated >= EXITER_PAGES => (Sysno::Exit, 0),
                _ if self.heap < HEAP_END => (Sysno::PageAlloc, self.heap),
                _ => (Sysno::Yield, 0),
            }
        };
        self.pending = Some(call.0);
        Action::Syscall(call.0, call.1)
    }
}
