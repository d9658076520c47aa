use kernel::memshow::MemoryView;
use kernel::{Pid, Platform, RegState};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::AddressSpace;

/// What the last memory view showed.
#[derive(Debug, Copy, Clone)]
pub struct ViewSummary {
    pub pid: Option<Pid>,
    pub mapped_pages: usize,
    pub free_frames: usize,
}

/// The machine as far as the kernel can tell.
#[derive(Default)]
pub struct SimPlatform {
    running: Option<(Pid, RegState)>,
    fault_address: VirtualAddress,
    pub timer_acks: u64,
    pub switches: u64,
    pub last_view: Option<ViewSummary>,
}

impl SimPlatform {
    /// The process control was handed to, with the registers it resumes with.
    pub const fn running(&self) -> Option<(Pid, RegState)> {
        self.running
    }

    /// Latch the address the next page fault reports.
    pub const fn set_fault_address(&mut self, va: VirtualAddress) {
        self.fault_address = va;
    }
}

impl Platform for SimPlatform {
    fn activate(&mut self, pid: Pid, regs: &RegState, _space: AddressSpace) {
        if self.running.is_some_and(|(prev, _)| prev != pid) {
            self.switches += 1;
        }
        self.running = Some((pid, *regs));
    }

    fn ack_timer(&mut self) {
        self.timer_acks += 1;
    }

    fn fault_address(&self) -> VirtualAddress {
        self.fault_address
    }

    fn show_memory(&mut self, view: &MemoryView<'_>) {
        self.last_view = Some(ViewSummary {
            pid: view.shown_pid(),
            mapped_pages: view.mappings().count(),
            free_frames: view.free_frames(),
        });
    }
}
