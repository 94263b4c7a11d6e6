//! A generic log proxy implementation.
//!
//! Grounded on `dqcsim/src/log/proxy.rs`: a [`Log`] implementation that
//! forwards every accepted [`Record`] across a `crossbeam_channel::Sender`,
//! filtering locally by level before the send so that disabled messages
//! never cross the channel.

use super::{Loglevel, LoglevelFilter, Record};
use crossbeam_channel::Sender;

/// Anything that can accept a log [`Record`].
pub trait Log: Send + Sync {
    fn name(&self) -> &str;
    fn enabled(&self, level: Loglevel) -> bool;
    fn log(&self, record: Record);
}

/// A [`Log`] that forwards accepted records across a channel.
#[derive(Debug)]
pub struct LogProxy {
    name: String,
    level: LoglevelFilter,
    sender: Sender<Record>,
}

impl LogProxy {
    pub fn new(name: impl Into<String>, level: LoglevelFilter, sender: Sender<Record>) -> LogProxy {
        LogProxy {
            name: name.into(),
            level,
            sender,
        }
    }

    pub fn boxed(
        name: impl Into<String>,
        level: LoglevelFilter,
        sender: Sender<Record>,
    ) -> Box<LogProxy> {
        Box::new(LogProxy::new(name, level, sender))
    }
}

impl Log for LogProxy {
    fn name(&self) -> &str {
        self.name.as_ref()
    }

    fn enabled(&self, level: Loglevel) -> bool {
        LoglevelFilter::from(level) <= self.level
    }

    fn log(&self, record: Record) {
        if self.enabled(record.level()) {
            // A disconnected receiver (logger thread already torn down)
            // should not panic a caller that's merely trying to log.
            let _ = self.sender.send(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_level_filters_are_inclusive() {
        let (sender, receiver) = crossbeam_channel::unbounded();

        let proxy = LogProxy::boxed("warn", LoglevelFilter::Warn, sender);
        assert!(proxy.enabled(Loglevel::Critical));
        assert!(proxy.enabled(Loglevel::Error));
        assert!(proxy.enabled(Loglevel::Warn));
        assert!(!proxy.enabled(Loglevel::Note));
        assert!(!proxy.enabled(Loglevel::Info));

        proxy.log(Record::new(Loglevel::Error, "test", "hello"));
        proxy.log(Record::new(Loglevel::Info, "test", "dropped"));
        let received = receiver.recv().unwrap();
        assert_eq!(received.message(), "hello");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn off_filter_admits_nothing() {
        let (sender, _receiver) = crossbeam_channel::unbounded();
        let proxy = LogProxy::boxed("off", LoglevelFilter::Off, sender);
        assert!(!proxy.enabled(Loglevel::Critical));
    }
}
