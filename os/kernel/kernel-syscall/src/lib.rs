//! # System Call ABI
//!
//! The boundary between user programs and the kernel: the numeric operation
//! codes and the register convention used to pass arguments and results.
//!
//! | Register | Direction | Meaning |
//! |----------|-----------|---------|
//! | `rax`    | in        | [`Sysno`] |
//! | `rdi`    | in        | first argument |
//! | `rax`    | out       | result; [`SYSCALL_FAILED`] (`-1`) on failure |
//!
//! | Call         | Number | Argument (`rdi`)            | Result |
//! |--------------|--------|-----------------------------|--------|
//! | `GETPID`     | 1      | –                           | caller's pid |
//! | `YIELD`      | 2      | –                           | 0 |
//! | `PANIC`      | 3      | message pointer or 0        | never returns |
//! | `PAGE_ALLOC` | 4      | page-aligned virtual address | 0 or -1 |
//! | `FORK`       | 5      | –                           | child pid to the parent, 0 to the child, or -1 |
//! | `EXIT`       | 6      | –                           | never returns |

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod regs;

pub use regs::RegState;

/// Interrupt vector used by the `int` instruction for system calls.
pub const SYSCALL_VECTOR: u64 = 0x80;

/// Result register value for a failed call (`-1` as unsigned).
pub const SYSCALL_FAILED: u64 = u64::MAX;

/// System call numbers, passed in `rax`.
#[repr(u64)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Sysno {
    /// Return the caller's process id.
    GetPid = 1,
    /// Give up the CPU to the next runnable process.
    Yield = 2,
    /// Halt the whole system, optionally with a message.
    Panic = 3,
    /// Back one virtual page with a fresh zeroed frame.
    PageAlloc = 4,
    /// Duplicate the calling process.
    Fork = 5,
    /// Terminate the calling process and reclaim its memory.
    Exit = 6,
}

/// A value in `rax` that names no system call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("unknown system call number {0}")]
pub struct UnknownSyscall(pub u64);

impl TryFrom<u64> for Sysno {
    type Error = UnknownSyscall;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            x if x == Self::GetPid as u64 => Ok(Self::GetPid),
            x if x == Self::Yield as u64 => Ok(Self::Yield),
            x if x == Self::Panic as u64 => Ok(Self::Panic),
            x if x == Self::PageAlloc as u64 => Ok(Self::PageAlloc),
            x if x == Self::Fork as u64 => Ok(Self::Fork),
            x if x == Self::Exit as u64 => Ok(Self::Exit),
            _ => Err(UnknownSyscall(value)),
        }
    }
}

impl From<Sysno> for u64 {
    #[inline]
    fn from(value: Sysno) -> Self {
        value as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_stable() {
        for (n, call) in [
            (1, Sysno::GetPid),
            (2, Sysno::Yield),
            (3, Sysno::Panic),
            (4, Sysno::PageAlloc),
            (5, Sysno::Fork),
            (6, Sysno::Exit),
        ] {
            assert_eq!(Sysno::try_from(n), Ok(call));
            assert_eq!(u64::from(call), n);
        }
    }

    #[test]
    fn unknown_numbers_are_rejected() {
        assert_eq!(Sysno::try_from(0), Err(UnknownSyscall(0)));
        assert_eq!(Sysno::try_from(7), Err(UnknownSyscall(7)));
        assert_eq!(
            UnknownSyscall(42).to_string(),
            "unknown system call number 42"
        );
    }
}
