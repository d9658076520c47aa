#![allow(dead_code)]

use kernel::memshow::MemoryView;
use kernel::{Kernel, KernelConfig, Pid, Platform, ProgramImage, RegState, Sysno};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::AddressSpace;
use std::num::NonZeroU32;

pub const CODE: u64 = 0x10_0000;
pub const DATA: u64 = 0x10_1000;
pub const HEAP: u64 = 0x11_0000;

/// Records everything the kernel asks of the machine.
#[derive(Default)]
pub struct TestPlatform {
    pub activations: Vec<(Pid, RegState, AddressSpace)>,
    pub timer_acks: usize,
    pub fault_address: u64,
    pub abort: bool,
    pub views: usize,
    pub last_shown: Option<Pid>,
}

impl Platform for TestPlatform {
    fn activate(&mut self, pid: Pid, regs: &RegState, space: AddressSpace) {
        self.activations.push((pid, *regs, space));
    }

    fn ack_timer(&mut self) {
        self.timer_acks += 1;
    }

    fn fault_address(&self) -> VirtualAddress {
        VirtualAddress::new(self.fault_address)
    }

    fn abort_requested(&mut self) -> bool {
        self.abort
    }

    fn show_memory(&mut self, view: &MemoryView<'_>) {
        self.views += 1;
        self.last_shown = view.shown_pid();
    }
}

pub fn init_logging() {
    let _ = kernel_trace::init(log::LevelFilter::Debug);
}

pub fn config() -> KernelConfig {
    KernelConfig::default().with_idle_spin_limit(NonZeroU32::new(4).unwrap())
}

pub fn fresh_kernel() -> Kernel<TestPlatform> {
    init_logging();
    Kernel::new(TestPlatform::default(), config()).unwrap()
}

/// One read-only code page and one writable data page starting with `0x41`.
pub fn program(name: &str) -> ProgramImage {
    ProgramImage::builder(name)
        .code(VirtualAddress::new(CODE), &[0xCD, 0x80, 0xEB, 0xFC])
        .data(VirtualAddress::new(DATA), &[0x41, 0, 0, 0])
        .build()
}

/// Load `program` as pid 1 and run it.
pub fn booted() -> Kernel<TestPlatform> {
    let mut kernel = fresh_kernel();
    kernel.setup(Pid::new(1), &program("test")).unwrap();
    kernel.run(Pid::new(1)).unwrap();
    kernel
}

/// Make system call `sysno` from the current process and return its result.
pub fn call(kernel: &mut Kernel<TestPlatform>, sysno: Sysno, arg: u64) -> u64 {
    let pid = kernel.current();
    let regs = kernel.process(pid).regs().with_syscall(sysno, arg);
    kernel.syscall(&regs).unwrap();
    kernel.process(pid).regs().rax
}

pub fn free_frames(kernel: &Kernel<TestPlatform>) -> usize {
    kernel.memory().frames().free_count()
}

pub fn read_byte(kernel: &Kernel<TestPlatform>, pid: Pid, va: u64) -> u8 {
    let mut buf = [0];
    kernel
        .read_user(pid, VirtualAddress::new(va), &mut buf)
        .unwrap();
    buf[0]
}
