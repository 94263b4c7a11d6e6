use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{inv_arg, Result};

/// Severity of a log record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Loglevel {
    Critical,
    Error,
    Warn,
    Note,
    Info,
    Debug,
    Trace,
}

/// Minimum severity a `Log` will accept, plus the two sentinels `Off`
/// (nothing passes) and `All` / `Trace` (everything passes).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoglevelFilter {
    Off,
    Critical,
    Error,
    Warn,
    Note,
    Info,
    Debug,
    Trace,
}

impl From<Loglevel> for LoglevelFilter {
    fn from(level: Loglevel) -> LoglevelFilter {
        match level {
            Loglevel::Critical => LoglevelFilter::Critical,
            Loglevel::Error => LoglevelFilter::Error,
            Loglevel::Warn => LoglevelFilter::Warn,
            Loglevel::Note => LoglevelFilter::Note,
            Loglevel::Info => LoglevelFilter::Info,
            Loglevel::Debug => LoglevelFilter::Debug,
            Loglevel::Trace => LoglevelFilter::Trace,
        }
    }
}

impl fmt::Display for Loglevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Loglevel::Critical => "critical",
            Loglevel::Error => "error",
            Loglevel::Warn => "warn",
            Loglevel::Note => "note",
            Loglevel::Info => "info",
            Loglevel::Debug => "debug",
            Loglevel::Trace => "trace",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for LoglevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LoglevelFilter::Off => "off",
            LoglevelFilter::Critical => "critical",
            LoglevelFilter::Error => "error",
            LoglevelFilter::Warn => "warn",
            LoglevelFilter::Note => "note",
            LoglevelFilter::Info => "info",
            LoglevelFilter::Debug => "debug",
            LoglevelFilter::Trace => "trace",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for LoglevelFilter {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<LoglevelFilter> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LoglevelFilter::Off),
            "critical" | "fatal" => Ok(LoglevelFilter::Critical),
            "error" => Ok(LoglevelFilter::Error),
            "warn" | "warning" => Ok(LoglevelFilter::Warn),
            "note" => Ok(LoglevelFilter::Note),
            "info" => Ok(LoglevelFilter::Info),
            "debug" => Ok(LoglevelFilter::Debug),
            "trace" => Ok(LoglevelFilter::Trace),
            other => inv_arg(format!("invalid log level: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_ordering_matches_severity() {
        assert!(LoglevelFilter::Critical < LoglevelFilter::Trace);
        assert!(LoglevelFilter::Off < LoglevelFilter::Critical);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "WARN".parse::<LoglevelFilter>().unwrap(),
            LoglevelFilter::Warn
        );
        assert!("nonsense".parse::<LoglevelFilter>().is_err());
    }
}
