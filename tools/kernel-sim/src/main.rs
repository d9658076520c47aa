//! Boots the kernel on a simulated machine and runs the built-in programs.
//!
//! ```text
//! kernel-sim [PROGRAM] [--steps N] [--memory BYTES] [--verbose]
//! ```
//!
//! Without `PROGRAM` every built-in program is started.

mod platform;
mod programs;

use kernel::interrupts::{PAGE_FAULT_VECTOR, TIMER_VECTOR};
use kernel::{Dispatch, Kernel, KernelConfig, KernelHalt, NPROC, Pid, ProcessState, Sysno};
use kernel_info::layout::MemoryLayout;
use log::{LevelFilter, info};
use platform::SimPlatform;
use programs::{Action, Program, UserTask};
use std::env;
use std::num::NonZeroU32;
use std::process::ExitCode;

/// A timer interrupt arrives every this many steps.
const TIMER_INTERVAL: u64 = 8;
const DEFAULT_STEPS: u64 = 2_000;
/// Empty scheduler rounds before the simulation counts as idle.
const IDLE_ROUNDS: u32 = 64;

#[derive(Debug, thiserror::Error)]
enum ArgsError {
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    #[error("option `{0}` needs a value")]
    MissingValue(&'static str),
    #[error("invalid number `{0}`")]
    BadNumber(String),
    #[error("unknown program `{0}` (try allocator, forker or exiter)")]
    UnknownProgram(String),
}

#[derive(Debug)]
struct Args {
    program: Option<Program>,
    steps: u64,
    memory: Option<u64>,
    verbose: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            program: None,
            steps: DEFAULT_STEPS,
            memory: None,
            verbose: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--steps" => parsed.steps = number(args.next(), "--steps")?,
                "--memory" => parsed.memory = Some(number(args.next(), "--memory")?),
                "-v" | "--verbose" => parsed.verbose = true,
                flag if flag.starts_with('-') => {
                    return Err(ArgsError::UnknownOption(flag.to_string()));
                }
                name => {
                    let program = Program::from_name(name)
                        .ok_or_else(|| ArgsError::UnknownProgram(name.to_string()))?;
                    parsed.program = Some(program);
                }
            }
        }
        Ok(parsed)
    }
}

fn number(value: Option<String>, option: &'static str) -> Result<u64, ArgsError> {
    let value = value.ok_or(ArgsError::MissingValue(option))?;
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ArgsError::BadNumber(value))
}

fn main() -> ExitCode {
    let args = match Args::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("kernel-sim: {e}");
            return ExitCode::from(2);
        }
    };

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if kernel_trace::init(level).is_err() {
        eprintln!("kernel-sim: logger already installed");
    }

    let mut config = KernelConfig::default();
    if let Some(bytes) = args.memory {
        config = config.with_layout(MemoryLayout::with_physical_size(bytes));
    }
    if let Some(rounds) = NonZeroU32::new(IDLE_ROUNDS) {
        config = config.with_idle_spin_limit(rounds);
    }

    let mut sim = match Simulation::boot(config, args.program) {
        Ok(sim) => sim,
        Err(halt) => {
            eprintln!("kernel halted during boot: {halt}");
            return ExitCode::FAILURE;
        }
    };
    let outcome = sim.run(args.steps);
    sim.print_summary();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(halt) => {
            eprintln!("kernel halted: {halt}");
            ExitCode::FAILURE
        }
    }
}

/// The kernel plus the emulated user side of every process.
struct Simulation {
    kernel: Kernel<SimPlatform>,
    tasks: [Option<UserTask>; NPROC],
    steps: u64,
    idle: bool,
}

impl Simulation {
    fn boot(config: KernelConfig, program: Option<Program>) -> Result<Self, KernelHalt> {
        let registry = programs::registry();
        let mut kernel = Kernel::new(SimPlatform::default(), config)?;
        kernel.boot(&registry, program.map(Program::name))?;

        let mut tasks: [Option<UserTask>; NPROC] = Default::default();
        let started: Vec<Program> = match program {
            Some(program) => vec![program],
            None => registry
                .iter()
                .filter_map(|image| Program::from_name(image.name()))
                .collect(),
        };
        for (slot, program) in started.into_iter().enumerate() {
            tasks[slot + 1] = Some(UserTask::new(program));
        }

        Ok(Self {
            kernel,
            tasks,
            steps: 0,
            idle: false,
        })
    }

    fn run(&mut self, steps: u64) -> Result<(), KernelHalt> {
        while self.steps < steps {
            self.steps += 1;
            let Some((pid, regs)) = self.kernel.platform().running() else {
                break;
            };

            let dispatch = if self.steps % TIMER_INTERVAL == 0 {
                self.kernel.exception(&regs.with_trap(TIMER_VECTOR, 0))?
            } else {
                self.user_step(pid, regs)?
            };

            if dispatch == Dispatch::Idle {
                info!("no runnable process left after {} steps", self.steps);
                self.idle = true;
                break;
            }
        }
        Ok(())
    }

    /// Let `pid` run until it next enters the kernel.
    fn user_step(&mut self, pid: Pid, regs: kernel::RegState) -> Result<Dispatch, KernelHalt> {
        let Some(task) = self.tasks[pid.as_usize()].as_mut() else {
            // Not one of ours; let it spin until the next tick.
            return self.kernel.exception(&regs.with_trap(TIMER_VECTOR, 0));
        };
        task.resume(regs.rax);

        match task.step(pid.as_u64()) {
            Action::Store(va, byte) => match self.kernel.write_user(pid, va, &[byte]) {
                Ok(()) => Ok(Dispatch::Run(pid)),
                Err(fault) => {
                    self.kernel.platform_mut().set_fault_address(fault.va);
                    let trap = regs.with_trap(PAGE_FAULT_VECTOR, fault.error.into_bits());
                    self.kernel.exception(&trap)
                }
            },
            Action::Syscall(sysno, arg) => {
                let dispatch = self.kernel.syscall(&regs.with_syscall(sysno, arg))?;
                if sysno == Sysno::Fork {
                    self.adopt_child(pid);
                }
                if sysno == Sysno::Exit {
                    self.tasks[pid.as_usize()] = None;
                }
                Ok(dispatch)
            }
        }
    }

    /// Give a freshly forked child a copy of its parent's user state.
    fn adopt_child(&mut self, parent: Pid) {
        let rax = self.kernel.process(parent).regs().rax;
        let Ok(slot) = usize::try_from(rax) else {
            return;
        };
        if slot < NPROC {
            self.tasks[slot] = self.tasks[parent.as_usize()]
                .as_ref()
                .map(UserTask::forked_child);
        }
    }

    fn print_summary(&self) {
        let kernel = &self.kernel;
        let frames = kernel.memory().frames();
        let usable = frames.iter().filter(|f| !f.reserved).count();

        println!("steps:     {}{}", self.steps, if self.idle { " (idle)" } else { "" });
        println!("ticks:     {}", kernel.ticks());
        println!("switches:  {}", kernel.platform().switches);
        println!("frames:    {} of {usable} free", frames.free_count());
        if let Some(view) = kernel.platform().last_view {
            if let Some(pid) = view.pid {
                println!(
                    "memshow:   process {pid}, {} pages mapped, {} frames free",
                    view.mapped_pages, view.free_frames
                );
            }
        }

        for proc in kernel.processes().iter().skip(1) {
            if proc.state() == ProcessState::Free {
                continue;
            }
            let program = self.tasks[proc.pid().as_usize()]
                .as_ref()
                .map_or("?", |t| t.program().name());
            println!("process {:>2}: {:<9} {:?}", proc.pid(), program, proc.state());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(list.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn parses_options() {
        let parsed = args(&["forker", "--steps", "50", "--memory", "0x100000"]).unwrap();
        assert_eq!(parsed.program, Some(Program::Forker));
        assert_eq!(parsed.steps, 50);
        assert_eq!(parsed.memory, Some(0x10_0000));
        assert!(!parsed.verbose);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(matches!(args(&["--steps"]), Err(ArgsError::MissingValue("--steps"))));
        assert!(matches!(args(&["--steps", "x"]), Err(ArgsError::BadNumber(_))));
        assert!(matches!(args(&["--frobnicate"]), Err(ArgsError::UnknownOption(_))));
        assert!(matches!(args(&["shell"]), Err(ArgsError::UnknownProgram(_))));
    }

    #[test]
    fn all_programs_run_until_memory_is_exhausted() {
        let mut sim = Simulation::boot(KernelConfig::default(), None).unwrap();
        sim.run(5_000).unwrap();

        let kernel = &sim.kernel;
        assert!(kernel.ticks() > 0);
        assert_eq!(kernel.process(Pid::new(3)).state(), ProcessState::Free);
        assert!(
            kernel
                .processes()
                .iter()
                .filter(|p| p.state() == ProcessState::Runnable)
                .count()
                >= 3
        );
    }

    #[test]
    fn exiter_alone_goes_idle() {
        let config = KernelConfig::default()
            .with_idle_spin_limit(NonZeroU32::new(4).unwrap());
        let mut sim = Simulation::boot(config, Some(Program::Exiter)).unwrap();
        sim.run(1_000).unwrap();
        assert!(sim.idle);
        assert_eq!(
            sim.kernel.memory().frames().free_count(),
            sim.kernel.memory().frames().iter().filter(|f| !f.reserved).count() - 4
        );
    }
}
