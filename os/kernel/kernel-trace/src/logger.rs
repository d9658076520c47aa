use crate::trace_fmt::TraceSink;
use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log::Log` sink writing `[LEVEL] target: message` lines to the trace output.
pub struct KernelLogger {
    max_level: LevelFilter,
}

static LOGGER: KernelLogger = KernelLogger::new(LevelFilter::Trace);

/// Install the kernel logger and set the global level filter.
///
/// Call this once during early init.
///
/// # Errors
/// If another logger was installed before.
pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level);
    Ok(())
}

/// Format one record the way [`KernelLogger`] prints it.
///
/// # Errors
/// Propagates errors of the underlying writer.
pub fn write_record(w: &mut impl fmt::Write, record: &Record) -> fmt::Result {
    writeln!(w, "[{}] {}: {}", record.level(), record.target(), record.args())
}

impl KernelLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Best-effort; there is nowhere to report a failing sink.
        let _ = write_record(&mut TraceSink, record);
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn records_are_formatted_on_one_line() {
        let mut out = String::new();
        write_record(
            &mut out,
            &Record::builder()
                .level(Level::Warn)
                .target("kernel::task")
                .args(format_args!("process {} is broken", 3))
                .build(),
        )
        .unwrap();
        assert_eq!(out, "[WARN] kernel::task: process 3 is broken\n");
    }

    #[test]
    fn level_filter_applies() {
        let logger = KernelLogger::new(LevelFilter::Info);
        let debug = Metadata::builder().level(Level::Debug).build();
        let error = Metadata::builder().level(Level::Error).build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&error));
    }
}
