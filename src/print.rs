//! The [`log`] backend that prints log records to stderr.

use spin::Once;

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        cfg!(any(debug_assertions, feature = "logging")) || metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            let mod_path = record
                .module_path_static()
                .or_else(|| record.module_path())
                .unwrap_or("<n/a>");

            eprintln!("[ {:>5} ] [{}] {}", record.level(), mod_path, record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger;
static INIT: Once<()> = Once::new();

/// Installs the logger for this process.
///
/// Calling this more than once is fine, only the first call has any effect.
/// If another logger was already installed, that one is kept.
pub fn init_logging() {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}
