use bitfield_struct::bitfield;

/// Page-fault error code layout (x86-64).
///
/// Each bit describes the condition that caused the page fault.
/// Reference: Intel SDM Vol. 3A, §6.15.1 “Page-Fault Exception (#PF)”.
///
/// [`AddressSpace::check_access`](crate::AddressSpace::check_access) produces
/// the same code the MMU would push for a denied access, and the trap decoder
/// reads it back from the saved register state.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    /// 1 = protection-key violation (if CR4.PKE=1).
    pub protection_key: bool, // bit 5

    /// 1 = shadow stack access (if CET-SS enabled).
    pub shadow_stack: bool, // bit 6

    #[bits(57)]
    __: u64, // reserved / ignored bits
}

impl PageFaultError {
    /// The fault code for a denied `access`.
    #[must_use]
    pub const fn for_access(access: MemoryAccess, present: bool) -> Self {
        Self::new()
            .with_present(present)
            .with_write(access.write)
            .with_user(access.user)
    }

    /// `"read"` or `"write"`.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        if self.write() { "write" } else { "read" }
    }

    /// `"protection problem"` for present pages, `"missing page"` otherwise.
    #[must_use]
    pub const fn problem(&self) -> &'static str {
        if self.present() {
            "protection problem"
        } else {
            "missing page"
        }
    }

    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "Non-present page (page not mapped)"
        } else if self.instruction_fetch() {
            if self.user() {
                "User-mode instruction fetch on protected page"
            } else {
                "Kernel instruction fetch on protected page"
            }
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}

/// Kind of memory access checked against a mapping.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MemoryAccess {
    pub write: bool,
    pub user: bool,
}

impl MemoryAccess {
    pub const USER_READ: Self = Self {
        write: false,
        user: true,
    };
    pub const USER_WRITE: Self = Self {
        write: true,
        user: true,
    };
    pub const KERNEL_READ: Self = Self {
        write: false,
        user: false,
    };
    pub const KERNEL_WRITE: Self = Self {
        write: true,
        user: false,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hardware_error_codes() {
        let err = PageFaultError::from_bits(0b111);
        assert!(err.present() && err.write() && err.user());
        assert_eq!(err.operation(), "write");
        assert_eq!(err.problem(), "protection problem");

        let err = PageFaultError::from_bits(0b100);
        assert_eq!(err.operation(), "read");
        assert_eq!(err.problem(), "missing page");
        assert_eq!(err.explain(), "Non-present page (page not mapped)");
    }

    #[test]
    fn access_codes_round_into_the_right_bits() {
        let err = PageFaultError::for_access(MemoryAccess::USER_WRITE, true);
        assert_eq!(err.into_bits(), 0b111);
        let err = PageFaultError::for_access(MemoryAccess::KERNEL_READ, false);
        assert_eq!(err.into_bits(), 0);
    }
}
