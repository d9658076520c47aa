use crate::{SYSCALL_VECTOR, Sysno};

/// Saved register state of a process.
///
/// This is what the entry trampoline pushes before calling into the kernel
/// and what it pops when transferring control back into a process. The
/// kernel only ever reads or writes it while the process is not running.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RegState {
    // Pushed by the entry stub.
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,

    /// Interrupt vector that caused the kernel entry.
    pub intno: u64,
    /// Hardware error code (zero if the vector has none).
    pub errcode: u64,

    // Pushed by the CPU on interrupt gate entry.
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl RegState {
    /// Code segment selector for user mode (GDT index 3, RPL 3).
    pub const USER_CS: u64 = 0x1B;
    /// Stack segment selector for user mode (GDT index 4, RPL 3).
    pub const USER_SS: u64 = 0x23;
    /// `IF` plus the always-one bit 1.
    pub const USER_RFLAGS: u64 = 0x202;

    /// Initial state of a process about to enter user mode at `rip`.
    #[must_use]
    pub const fn user_entry(rip: u64, rsp: u64) -> Self {
        Self {
            rip,
            rsp,
            cs: Self::USER_CS,
            ss: Self::USER_SS,
            rflags: Self::USER_RFLAGS,
            ..Self::zeroed()
        }
    }

    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            rax: 0,
            rcx: 0,
            rdx: 0,
            rbx: 0,
            rbp: 0,
            rsi: 0,
            rdi: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            intno: 0,
            errcode: 0,
            rip: 0,
            cs: 0,
            rflags: 0,
            rsp: 0,
            ss: 0,
        }
    }

    /// This state as it looks on entry for a system call `raw` with argument `arg`.
    #[must_use]
    pub const fn with_syscall_raw(mut self, raw: u64, arg: u64) -> Self {
        self.intno = SYSCALL_VECTOR;
        self.errcode = 0;
        self.rax = raw;
        self.rdi = arg;
        self
    }

    /// This state as it looks on entry for system call `sysno` with argument `arg`.
    #[must_use]
    pub const fn with_syscall(self, sysno: Sysno, arg: u64) -> Self {
        self.with_syscall_raw(sysno as u64, arg)
    }

    /// This state as it looks on entry for interrupt `vector`.
    #[must_use]
    pub const fn with_trap(mut self, vector: u64, errcode: u64) -> Self {
        self.intno = vector;
        self.errcode = errcode;
        self
    }

    /// The system call number register.
    #[inline]
    #[must_use]
    pub const fn syscall_number(&self) -> u64 {
        self.rax
    }

    /// The first argument register.
    #[inline]
    #[must_use]
    pub const fn arg0(&self) -> u64 {
        self.rdi
    }

    /// Store a system call result.
    #[inline]
    pub const fn set_return(&mut self, value: u64) {
        self.rax = value;
    }
}
