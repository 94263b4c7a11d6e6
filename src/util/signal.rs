//! OS signal handling, feeding the engine's abort path.
//!
//! Grounded on `dqcsim/src/util/signal.rs`'s `notify()`: a background thread
//! wraps `signal_hook::iterator::Signals` and forwards received signals over
//! a bounded `crossbeam_channel`. `spawn_abort_watcher` builds on that to
//! match `engine/src/main_run.hpp`'s `handle_signal`: the first two SIGINT/
//! SIGTERM deliveries request a graceful abort, the third forces an
//! immediate process exit since the engine may be stuck holding a lock.
use crate::trace;
use crate::error::Result;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// A signal delivered to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Sigterm,
    Sigint,
    Sigquit,
    Other(c_int),
}

/// Registers a signal hook for `signals` and returns a receiver that yields
/// each one as it arrives.
pub fn notify(signals: &[c_int]) -> Result<crossbeam_channel::Receiver<Signal>> {
    let (tx, rx) = crossbeam_channel::bounded(100);
    let registered = signal_hook::iterator::Signals::new(signals)
        .map_err(|e| crate::error::ErrorKind::IoError(e.to_string()))?;
    thread::Builder::new()
        .name("signal".to_owned())
        .spawn(move || {
            for signal in registered.forever() {
                let mapped = match signal {
                    signal_hook::SIGTERM => Signal::Sigterm,
                    signal_hook::SIGINT => Signal::Sigint,
                    signal_hook::SIGQUIT => Signal::Sigquit,
                    other => Signal::Other(other),
                };
                if tx.send(mapped).is_err() {
                    break;
                }
            }
        })
        .expect("failed to spawn signal thread");
    trace!("signal hook running for {:?}", signals);
    Ok(rx)
}

static INTERRUPT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Spawns a background thread that watches for SIGINT/SIGTERM and calls
/// `on_abort` the first two times either is received. A third delivery
/// force-exits the process immediately, mirroring the original engine's
/// fallback for a hung abort path.
pub fn spawn_abort_watcher(on_abort: impl Fn() + Send + 'static) -> Result<()> {
    let rx = notify(&[signal_hook::SIGINT, signal_hook::SIGTERM])?;
    thread::Builder::new()
        .name("signal-watcher".to_owned())
        .spawn(move || {
            while let Ok(signal) = rx.recv() {
                match signal {
                    Signal::Sigint | Signal::Sigterm => {
                        eprintln!();
                        let count = INTERRUPT_COUNT.fetch_add(1, Ordering::SeqCst) + 1;
                        if count >= 3 {
                            std::process::exit(130);
                        }
                        on_abort();
                    }
                    _ => {}
                }
            }
        })
        .expect("failed to spawn signal watcher thread");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn notify_registers_without_error() {
        let rx = notify(&[signal_hook::SIGUSR1]);
        assert!(rx.is_ok());
    }

    #[test]
    fn spawn_abort_watcher_installs_handler() {
        let called = Arc::new(AtomicBool::new(false));
        let called2 = called.clone();
        assert!(spawn_abort_watcher(move || called2.store(true, Ordering::SeqCst)).is_ok());
    }
}
