//! A minimal stderr logger, the "transport" half of logging that §1 leaves
//! out of the core's scope: the core only ever calls the `log` facade
//! macros. This is the daemon's equivalent of the original's
//! `openlog()`/`LOG_PERROR` mirror, without the syslog transport itself.

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("{:<5} {}: {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

/// Install the logger, gating the max level on the `-d` flag the same way
/// the original daemon gated `LOG_DEBUG` vs. `LOG_NOTICE` via `setlogmask`.
pub fn init(debug: bool) {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };
    log::set_max_level(level);
    // Only the first call in a process wins; a second responder embedded in
    // the same binary (e.g. tests) just keeps whatever logger is installed.
    let _ = log::set_boxed_logger(Box::new(StderrLogger));
}
