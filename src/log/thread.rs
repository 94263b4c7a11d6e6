//! The log thread: owns the receiving end of the log channel and renders
//! records to a colored terminal, optionally teeing to files.
//!
//! Grounded on `dqcsim-log/src/thread.rs` and `dqcsim/src/log/thread.rs`.

use super::{level_to_color, set_thread_logger, LogProxy, LoglevelFilter, Record, TeeFile};
use crate::error::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::thread::JoinHandle;

/// A thread dedicated to rendering log records.
///
/// The log thread hands producers a clone of the sender side of the log
/// channel via [`LogThread::get_sender`]. Producers forward their records
/// into this channel; the thread itself owns the terminal and any tee
/// files, so only one writer ever touches stderr.
pub struct LogThread {
    sender: Option<crossbeam_channel::Sender<Record>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl LogThread {
    /// Starts a new log thread rendering at `stderr_level`, additionally
    /// mirroring records into each `tee_files` entry at its own level.
    ///
    /// Also installs a [`LogProxy`] as the calling thread's thread-local
    /// logger, so `trace!`/`debug!`/... calls from this thread are routed
    /// here immediately.
    pub fn spawn(stderr_level: LoglevelFilter, tee_files: Vec<TeeFile>) -> Result<LogThread> {
        let (sender, receiver): (_, crossbeam_channel::Receiver<Record>) =
            crossbeam_channel::unbounded();

        let handle = std::thread::Builder::new()
            .name("log".to_owned())
            .spawn(move || -> Result<()> {
                let mut term = term::stderr();
                let mut tee_handles: Vec<(LoglevelFilter, std::fs::File)> = tee_files
                    .into_iter()
                    .map(|tee| {
                        let file = OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(&tee.filename)?;
                        Ok((tee.level, file))
                    })
                    .collect::<Result<_>>()?;

                while let Ok(record) = receiver.recv() {
                    if LoglevelFilter::from(record.level()) <= stderr_level {
                        render_to_terminal(&mut term, &record)?;
                    }
                    for (level, file) in tee_handles.iter_mut() {
                        if LoglevelFilter::from(record.level()) <= *level {
                            writeln!(
                                file,
                                "{} {:>8} {:15} {}",
                                humantime::format_rfc3339_seconds(record.timestamp()),
                                record.level(),
                                record.target(),
                                record
                            )?;
                        }
                    }
                }
                Ok(())
            })
            .expect("failed to spawn log thread");

        set_thread_logger(LogProxy::boxed("main", LoglevelFilter::Trace, sender.clone()));

        Ok(LogThread {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Returns a clone of the sender side of the log channel, for handing to
    /// other threads or in-process plugins that want to log here.
    pub fn get_sender(&self) -> Option<crossbeam_channel::Sender<Record>> {
        self.sender.clone()
    }
}

fn render_to_terminal(term: &mut Option<Box<term::StderrTerminal>>, record: &Record) -> Result<()> {
    if let Some(t) = term {
        let _ = t.reset();
        let _ = t.attr(term::Attr::Dim);
        write!(
            t,
            "{} ",
            humantime::format_rfc3339_seconds(record.timestamp())
        )?;
        let _ = t.reset();

        let _ = t.attr(term::Attr::Bold);
        let _ = t.fg(level_to_color(record.level()));
        write!(t, "{:5} ", record.level())?;
        let _ = t.reset();

        let _ = t.attr(term::Attr::Dim);
        let target = record.target();
        if target.len() >= 15 {
            write!(t, "{:15} ", &target[..14])?;
        } else {
            write!(t, "{:15} ", target)?;
        }
        let _ = t.reset();

        writeln!(t, "{}", record)?;
        let _ = t.reset();
    } else {
        eprintln!(
            "{} {:5} {} {}",
            humantime::format_rfc3339_seconds(record.timestamp()),
            record.level(),
            record.target(),
            record
        );
    }
    Ok(())
}

impl Drop for LogThread {
    /// Drops the sender side of the log channel and waits for the log
    /// thread to drain and exit.
    fn drop(&mut self) {
        super::drop_thread_logger();
        self.sender = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
