//! # Kernel Trace Output
//!
//! Diagnostic output for the kernel: a `log::Log` implementation and a
//! direct trace macro that bypasses the logging framework.
//!
//! ## Output Mechanism
//! ```text
//! Kernel Code                 log::info!(…)
//!     ↓                            ↓
//! kernel_trace! macro         KernelLogger
//!     ↓                            ↓
//! trace_fmt::TraceSink ◄───────────┘
//!     ↓
//! stderr (feature `std`) or nothing
//! ```
//!
//! The kernel crates never touch a console themselves. Whoever hosts the
//! kernel decides whether output goes anywhere by enabling the `std`
//! feature; without it every write is a no-op and the crate stays `no_std`.
//!
//! ## Usage
//! ```rust,no_run
//! use log::{LevelFilter, info};
//!
//! kernel_trace::init(LevelFilter::Debug).expect("logger initialization");
//! info!("kernel booted");
//! kernel_trace::kernel_trace!("raw line: {:#x}\n", 0x1000);
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod logger;

pub use logger::{KernelLogger, init, write_record};

#[doc(hidden)]
pub mod trace_fmt {
    use core::fmt::{self, Write};

    /// `core::fmt::Write` adapter for the trace output.
    pub struct TraceSink;

    #[cfg(any(test, feature = "std"))]
    impl Write for TraceSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            use std::io::Write as _;
            std::io::stderr()
                .lock()
                .write_all(s.as_bytes())
                .map_err(|_| fmt::Error)
        }
    }

    #[cfg(not(any(test, feature = "std")))]
    impl Write for TraceSink {
        #[inline]
        fn write_str(&mut self, _: &str) -> fmt::Result {
            // no sink without `std`
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn trace_write(args: fmt::Arguments) {
        // Ignore errors; this is best-effort debug output.
        let _ = fmt::write(&mut TraceSink, args);
    }
}

/// Write formatted output directly to the trace sink.
#[macro_export]
macro_rules! kernel_trace {
    ($($arg:tt)*) => {{
        // No allocation: `format_args!` builds a lightweight `Arguments`.
        $crate::trace_fmt::trace_write(core::format_args!($($arg)*));
    }};
}
