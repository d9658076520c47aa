mod common;

use common::{CODE, TestPlatform, config, free_frames, init_logging, fresh_kernel, program};
use kernel::{Dispatch, Kernel, KernelHalt, NPROC, Pid, ProcessState, ProgramImage, ProgramRegistry};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::Permissions;

fn registry(names: &[&str]) -> ProgramRegistry {
    names.iter().map(|&name| program(name)).collect()
}

#[test]
fn kernel_page_table_identity_maps_memory() {
    let kernel = fresh_kernel();
    let space = kernel.kernel_space();
    let mem = kernel.memory();
    let at = |va: u64| space.lookup(mem, VirtualAddress::new(va));

    assert!(at(0).is_none());
    for va in [0x1000, 0x4_0000, 0x7_F000, 0xB_8000, 0x10_0000, 0x1F_F000] {
        let m = at(va).unwrap();
        assert_eq!(m.page.base().as_u64(), va);
    }
    assert_eq!(at(0x4_0000).unwrap().perm, Permissions::KERNEL_RW);
    assert_eq!(at(0xB_8000).unwrap().perm, Permissions::USER_RW);
    assert_eq!(at(0x10_0000).unwrap().perm, Permissions::USER_RW);
    assert!(at(0x20_0000).is_none());

    // Root, PDPT, PD and one page table.
    let total = mem.frames().iter().filter(|f| !f.reserved).count();
    assert_eq!(free_frames(&kernel), total - 4);
}

#[test]
fn boots_every_program_in_order() {
    let mut kernel = fresh_kernel();
    let dispatch = kernel.boot(&registry(&["a", "b", "c"]), None).unwrap();
    assert_eq!(dispatch, Dispatch::Run(Pid::new(1)));
    for pid in 1..=3 {
        assert_eq!(kernel.process(Pid::new(pid)).state(), ProcessState::Runnable);
    }
    assert_eq!(kernel.process(Pid::new(4)).state(), ProcessState::Free);
    assert_eq!(kernel.current(), Pid::new(1));
    assert_eq!(kernel.platform().activations.len(), 1);
}

#[test]
fn boots_the_named_program_only() {
    let mut kernel = fresh_kernel();
    let mut programs = registry(&["a"]);
    programs.register(
        ProgramImage::builder("b")
            .code(VirtualAddress::new(CODE + 0x4000), &[0xF4])
            .build(),
    );

    kernel.boot(&programs, Some("b")).unwrap();
    assert_eq!(
        kernel.process(Pid::new(1)).regs().rip,
        CODE + 0x4000
    );
    assert_eq!(kernel.process(Pid::new(2)).state(), ProcessState::Free);
}

#[test]
fn unknown_program_halts() {
    let mut kernel = fresh_kernel();
    assert!(matches!(
        kernel.boot(&registry(&["a"]), Some("nope")),
        Err(KernelHalt::UnknownProgram(name)) if name == "nope"
    ));
}

#[test]
fn too_many_programs_halt() {
    let names: Vec<String> = (0..NPROC).map(|i| format!("p{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut kernel = fresh_kernel();
    assert!(matches!(
        kernel.boot(&registry(&refs), None),
        Err(KernelHalt::TooManyPrograms(n)) if n == NPROC
    ));
}

#[test]
fn bad_image_halts_boot() {
    let mut kernel = fresh_kernel();
    let mut programs = ProgramRegistry::new();
    programs.register(
        ProgramImage::builder("low")
            .code(VirtualAddress::new(0x1000), &[0])
            .build(),
    );
    assert!(matches!(
        kernel.boot(&programs, None),
        Err(KernelHalt::Setup { pid, .. }) if pid == Pid::new(1)
    ));
}

#[test]
fn running_a_free_slot_is_refused() {
    let mut kernel = fresh_kernel();
    assert!(matches!(
        kernel.run(Pid::new(3)),
        Err(KernelHalt::NotRunnable(pid)) if pid == Pid::new(3)
    ));
    assert!(matches!(
        kernel.run(Pid::new(NPROC)),
        Err(KernelHalt::NotRunnable(_))
    ));
}

#[test]
fn idle_without_processes() {
    init_logging();
    let mut kernel = Kernel::new(TestPlatform::default(), config()).unwrap();
    assert_eq!(kernel.schedule().unwrap(), Dispatch::Idle);
}
