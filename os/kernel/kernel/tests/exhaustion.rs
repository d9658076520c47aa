//! Running out of physical memory must never leak frames.

mod common;

use common::{CODE, HEAP, TestPlatform, call, config, free_frames, init_logging, program};
use kernel::{Kernel, Pid, ProcessState, SYSCALL_FAILED, Sysno};
use kernel_info::layout::MemoryLayout;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};

/// A machine with 1 MiB of physical memory running one process.
fn small_machine() -> Kernel<TestPlatform> {
    init_logging();
    let config = config().with_layout(MemoryLayout::with_physical_size(0x10_0000));
    let mut kernel = Kernel::new(TestPlatform::default(), config).unwrap();
    kernel.setup(Pid::new(1), &program("p")).unwrap();
    kernel.run(Pid::new(1)).unwrap();
    kernel
}

/// Allocate heap pages until exactly `left` frames remain free.
fn drain_to(kernel: &mut Kernel<TestPlatform>, left: usize) {
    let mut va = HEAP;
    while free_frames(kernel) > left {
        assert_eq!(call(kernel, Sysno::PageAlloc, va), 0);
        va += PAGE_SIZE;
    }
    assert_eq!(free_frames(kernel), left);
}

fn code_refcount(kernel: &Kernel<TestPlatform>) -> u32 {
    let page = kernel
        .process(Pid::new(1))
        .space()
        .unwrap()
        .lookup(kernel.memory(), VirtualAddress::new(CODE))
        .unwrap()
        .page;
    kernel.memory().frames().refcount(page)
}

#[test]
fn page_alloc_fails_cleanly_when_memory_is_gone() {
    let mut kernel = small_machine();
    drain_to(&mut kernel, 0);
    assert_eq!(call(&mut kernel, Sysno::PageAlloc, 0x2F_0000), SYSCALL_FAILED);
    assert_eq!(free_frames(&kernel), 0);
}

#[test]
fn fork_without_table_frames_rolls_back() {
    let mut kernel = small_machine();
    drain_to(&mut kernel, 3);

    assert_eq!(call(&mut kernel, Sysno::Fork, 0), SYSCALL_FAILED);
    assert_eq!(free_frames(&kernel), 3);
    assert_eq!(kernel.process(Pid::new(2)).state(), ProcessState::Free);
    assert!(kernel.process(Pid::new(2)).space().is_none());
}

#[test]
fn fork_failing_while_copying_rolls_back_shared_pages() {
    let mut kernel = small_machine();
    // Root, three tables and two private copies.
    drain_to(&mut kernel, 6);

    assert_eq!(call(&mut kernel, Sysno::Fork, 0), SYSCALL_FAILED);
    assert_eq!(free_frames(&kernel), 6);
    assert_eq!(code_refcount(&kernel), 1);
    assert_eq!(kernel.process(Pid::new(2)).state(), ProcessState::Free);
}

#[test]
fn fork_with_no_free_frame_fails() {
    let mut kernel = small_machine();
    drain_to(&mut kernel, 0);
    assert_eq!(call(&mut kernel, Sysno::Fork, 0), SYSCALL_FAILED);
    assert_eq!(free_frames(&kernel), 0);
}

#[test]
fn fork_fails_when_the_table_is_full() {
    let mut kernel = common::booted();
    for _ in 2..kernel::NPROC {
        assert_ne!(call(&mut kernel, Sysno::Fork, 0), SYSCALL_FAILED);
    }
    let before = free_frames(&kernel);
    assert_eq!(call(&mut kernel, Sysno::Fork, 0), SYSCALL_FAILED);
    assert_eq!(free_frames(&kernel), before);
}

#[test]
fn setup_out_of_memory_leaves_nothing_behind() {
    let mut kernel = small_machine();
    drain_to(&mut kernel, 4);
    assert_eq!(
        kernel.setup(Pid::new(2), &program("q")),
        Err(kernel::SetupError::OutOfMemory)
    );
    assert_eq!(free_frames(&kernel), 4);
    assert_eq!(kernel.process(Pid::new(2)).state(), ProcessState::Free);
}
