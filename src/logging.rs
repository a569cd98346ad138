//! Log sink over semihosting
//!
//! Requires a debugger to be attached. Without one the first record halts
//! the core on the semihosting breakpoint.

use cortex_m_semihosting::hprintln;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Forwards `log` records to the host console
pub struct SemihostingLogger;

static LOGGER: SemihostingLogger = SemihostingLogger;

impl Log for SemihostingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            hprintln!("{:<5} {}", record.level(), record.args()).ok();
        }
    }

    fn flush(&self) {}
}

/// Install the semihosting logger
///
/// Fails if a logger was already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
