//! Error-handling.
//!
//! Types for error-handling in this crate, based on the [`failure`] crate.
//!
//! [`Error`] wraps the crate's [`ErrorKind`] in a [`failure::Context`], the
//! same pattern used throughout the engine: deep code throws a specific
//! kind, outer layers attach context and re-throw, and `main` maps the final
//! kind to a process exit code.

use failure::{Backtrace, Context, Fail};
use std::{fmt, fmt::Display, result};

/// Crate-wide `Result` alias.
pub type Result<T> = result::Result<T, Error>;

pub use failure::ResultExt;

/// Crate-wide error type. Implements [`Fail`].
#[derive(Debug)]
pub struct Error {
    ctx: Context<ErrorKind>,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.ctx.get_context()
    }
}

/// The five error kinds from the error handling design (spec §7), plus the
/// generic shorthands used throughout supporting code.
#[derive(Clone, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    /// Schema violation at a specific JSON pointer.
    #[fail(display = "configuration error at {}: {}", pointer, message)]
    ConfError { pointer: String, message: String },

    /// Schema construction or structural mismatch. Presented like a
    /// `ConfError` but distinguished for callers that need to tell the two
    /// apart (e.g. `usage`).
    #[fail(display = "schema error at {}: {}", pointer, message)]
    SchemaError { pointer: String, message: String },

    /// Runtime failure inside a plugin's lifecycle call.
    #[fail(display = "model error: {}", _0)]
    ModelError(String),

    /// Thrown by a model to request a RESET transition. Caught only at the
    /// state machine driver loop.
    #[fail(display = "model requested reset: {}", _0)]
    ModelReset(String),

    /// Thrown by a model to request a STOP transition.
    #[fail(display = "model requested stop: {}", _0)]
    ModelStop(String),

    /// Thrown by a model to request an ABORT transition.
    #[fail(display = "model requested abort: {}", _0)]
    ModelAbort(String),

    /// A trigger could not be constructed or inserted.
    #[fail(display = "trigger error: {}", _0)]
    TriggerError(String),

    /// A trigger's event or action conf was malformed.
    #[fail(display = "invalid trigger: {}", _0)]
    TriggerInvalid(String),

    /// An action factory could not be found for the given key.
    #[fail(display = "unknown action: {}", _0)]
    TriggerUnknownAction(String),

    /// An event factory could not be found for the given key.
    #[fail(display = "unknown event: {}", _0)]
    TriggerUnknownEvent(String),

    /// Marker wrapping any of the above after it has already been logged at
    /// the top level, so outer catches know not to re-log it.
    #[fail(display = "error already reported")]
    ConcludedError,

    /// Generic invalid argument.
    #[fail(display = "invalid argument: {}", _0)]
    InvalidArgument(String),

    /// Generic invalid operation.
    #[fail(display = "invalid operation: {}", _0)]
    InvalidOperation(String),

    /// Inter-thread channel failure.
    #[fail(display = "channel error: {}", _0)]
    ChannelError(String),

    /// Dynamic library loading failure.
    #[fail(display = "plugin loading error: {}", _0)]
    PluginError(String),

    /// I/O failure.
    #[fail(display = "io error: {}", _0)]
    IoError(String),

    /// Anything that doesn't fit the above.
    #[fail(display = "error: {}", _0)]
    Other(String),
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.ctx.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.ctx.backtrace()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.ctx.fmt(f)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            ctx: Context::new(kind),
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(ctx: Context<ErrorKind>) -> Error {
        Error { ctx }
    }
}

/// Shorthand for a `ConfError` at a pointer.
pub fn conf_err<T>(pointer: impl Into<String>, message: impl Into<String>) -> Result<T> {
    Err(ErrorKind::ConfError {
        pointer: pointer.into(),
        message: message.into(),
    }
    .into())
}

/// Shorthand for a `SchemaError` at a pointer.
pub fn schema_err<T>(pointer: impl Into<String>, message: impl Into<String>) -> Result<T> {
    Err(ErrorKind::SchemaError {
        pointer: pointer.into(),
        message: message.into(),
    }
    .into())
}

/// Shorthand for producing a `ModelError`.
pub fn model_err<T>(s: impl Into<String>) -> Result<T> {
    Err(ErrorKind::ModelError(s.into()).into())
}

/// Shorthand for a `TriggerUnknownEvent` error, usable as an `ok_or_else`
/// closure via [`oe_unknown_event`].
pub fn unknown_event<T>(name: impl Into<String>) -> Result<T> {
    Err(ErrorKind::TriggerUnknownEvent(name.into()).into())
}

pub fn oe_unknown_event(name: impl Into<String>) -> impl FnOnce() -> Error {
    move || ErrorKind::TriggerUnknownEvent(name.into()).into()
}

/// Shorthand for a `TriggerUnknownAction` error.
pub fn unknown_action<T>(name: impl Into<String>) -> Result<T> {
    Err(ErrorKind::TriggerUnknownAction(name.into()).into())
}

pub fn oe_unknown_action(name: impl Into<String>) -> impl FnOnce() -> Error {
    move || ErrorKind::TriggerUnknownAction(name.into()).into()
}

/// Shorthand for producing an invalid argument error.
pub fn inv_arg<T>(s: impl Into<String>) -> Result<T> {
    Err(ErrorKind::InvalidArgument(s.into()).into())
}

/// Shorthand for producing an invalid argument error in an `or_else`
/// function.
pub fn oe_inv_arg(s: impl Into<String>) -> impl FnOnce() -> Error {
    move || ErrorKind::InvalidArgument(s.into()).into()
}

/// Shorthand for producing an invalid operation error.
pub fn inv_op<T>(s: impl Into<String>) -> Result<T> {
    Err(ErrorKind::InvalidOperation(s.into()).into())
}

/// Shorthand for producing an invalid operation error in an `or_else`
/// function.
pub fn oe_inv_op(s: impl Into<String>) -> impl FnOnce() -> Error {
    move || ErrorKind::InvalidOperation(s.into()).into()
}

/// Shorthand for producing an error that does not fit any other category.
pub fn err<T>(s: impl Into<String>) -> Result<T> {
    Err(ErrorKind::Other(s.into()).into())
}

/// `err()` but for `or_else` functions.
pub fn oe_err(s: impl Into<String>) -> impl FnOnce() -> Error {
    move || ErrorKind::Other(s.into()).into()
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error {
            ctx: Context::new(ErrorKind::IoError(error.to_string())),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error {
            ctx: Context::new(ErrorKind::ConfError {
                pointer: "/".to_owned(),
                message: error.to_string(),
            }),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Error {
        Error {
            ctx: Context::new(ErrorKind::ConfError {
                pointer: "/".to_owned(),
                message: error.to_string(),
            }),
        }
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(error: crossbeam_channel::SendError<T>) -> Error {
        Error {
            ctx: Context::new(ErrorKind::ChannelError(error.to_string())),
        }
    }
}

impl From<crossbeam_channel::RecvError> for Error {
    fn from(error: crossbeam_channel::RecvError) -> Error {
        Error {
            ctx: Context::new(ErrorKind::ChannelError(error.to_string())),
        }
    }
}

impl From<libloading::Error> for Error {
    fn from(error: libloading::Error) -> Error {
        Error {
            ctx: Context::new(ErrorKind::PluginError(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conf_error_display() {
        let e: Error = ErrorKind::ConfError {
            pointer: "/engine/watchdog/mode".to_owned(),
            message: "unknown watchdog mode".to_owned(),
        }
        .into();
        assert_eq!(
            e.to_string(),
            "configuration error at /engine/watchdog/mode: unknown watchdog mode"
        );
    }

    #[test]
    fn shorthand_helpers_return_err() {
        let r: Result<()> = inv_arg("bad");
        assert!(r.is_err());
        let r: Result<()> = inv_op("bad");
        assert!(r.is_err());
        let r: Result<()> = err("bad");
        assert!(r.is_err());
    }
}
