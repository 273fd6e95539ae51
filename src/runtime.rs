use evlog::{LogEventConsolePrinter, Logger};
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<Logger> = OnceCell::new();

fn console_logger() -> Logger {
    let mut logger = Logger::default();
    logger.register(LogEventConsolePrinter::default());
    logger
}

/// Installs the process logger. Returns `false` if one was already in use.
pub fn set_logger(logger: Logger) -> bool {
    LOGGER.set(logger).is_ok()
}

/// The process logger; falls back to a console logger when none was set.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(console_logger)
}
