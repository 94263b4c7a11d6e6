//! Logging: levels, records, a thread-local dispatch point, and the
//! terminal-rendering [`LogThread`].
//!
//! Grounded on `dqcsim-log/src/lib.rs`'s `thread_local! LOGGER` pattern:
//! each thread keeps an optional boxed [`Log`] implementation, set once a
//! [`LogThread`] has been spawned and cleared again on thread teardown.
//! Code anywhere in the crate calls the `critical!`/`error!`/.../`trace!`
//! macros below, which look up the thread-local logger and silently no-op
//! if none has been installed (e.g. in unit tests that never spawn one).

mod level;
mod proxy;
mod record;
mod tee_file;
mod thread;

pub use level::{Loglevel, LoglevelFilter};
pub use proxy::{Log, LogProxy};
pub use record::Record;
pub use tee_file::TeeFile;
pub use thread::LogThread;

use std::cell::RefCell;

thread_local! {
    static LOGGER: RefCell<Option<Box<dyn Log>>> = RefCell::new(None);
}

/// Installs `logger` as this thread's logger, replacing any previous one.
pub fn set_thread_logger(logger: Box<dyn Log>) {
    LOGGER.with(|cell| *cell.borrow_mut() = Some(logger));
}

/// Clears this thread's logger, if any.
pub fn drop_thread_logger() {
    LOGGER.with(|cell| *cell.borrow_mut() = None);
}

/// Forwards `record` to this thread's logger, if one is installed and
/// accepts records at the record's level. Silently does nothing otherwise.
pub fn dispatch(target: &str, level: Loglevel, message: std::fmt::Arguments) {
    LOGGER.with(|cell| {
        if let Some(logger) = cell.borrow().as_ref() {
            if logger.enabled(level) {
                logger.log(Record::new(level, target, message.to_string()));
            }
        }
    });
}

pub(crate) fn level_to_color(level: Loglevel) -> term::color::Color {
    match level {
        Loglevel::Critical => term::color::BRIGHT_RED,
        Loglevel::Error => term::color::RED,
        Loglevel::Warn => term::color::YELLOW,
        Loglevel::Note => term::color::BRIGHT_BLUE,
        Loglevel::Info => term::color::GREEN,
        Loglevel::Debug => term::color::CYAN,
        Loglevel::Trace => term::color::BRIGHT_BLACK,
    }
}

#[macro_export]
macro_rules! critical {
    ($($arg:tt)+) => {
        $crate::log::dispatch(module_path!(), $crate::log::Loglevel::Critical, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::log::dispatch(module_path!(), $crate::log::Loglevel::Error, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::log::dispatch(module_path!(), $crate::log::Loglevel::Warn, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! note {
    ($($arg:tt)+) => {
        $crate::log::dispatch(module_path!(), $crate::log::Loglevel::Note, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::log::dispatch(module_path!(), $crate::log::Loglevel::Info, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        $crate::log::dispatch(module_path!(), $crate::log::Loglevel::Debug, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => {
        $crate::log::dispatch(module_path!(), $crate::log::Loglevel::Trace, format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_without_logger_is_a_noop() {
        drop_thread_logger();
        dispatch("test", Loglevel::Error, format_args!("no logger installed"));
    }

    #[test]
    fn dispatch_forwards_to_installed_logger() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        set_thread_logger(LogProxy::boxed("test", LoglevelFilter::Info, sender));
        dispatch("test::target", Loglevel::Warn, format_args!("hello {}", 42));
        let record = receiver.recv().unwrap();
        assert_eq!(record.target(), "test::target");
        assert_eq!(record.message(), "hello 42");
        drop_thread_logger();
    }
}
