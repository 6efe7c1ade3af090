//! Ordered, asynchronous log sink.
//!
//! Producers enqueue [`LogEvent`]s from any thread without blocking on I/O.
//! A single writer thread drains the queue in arrival order and writes each
//! line to the console and to the log file, so lines from concurrent
//! producers never interleave.

pub mod event;

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::error::MirrorError;

pub use event::{LogEvent, Severity};

/// How much the logger emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet = 0,
    /// Errors and important messages.
    #[default]
    Important = 1,
    /// Everything.
    All = 2,
}

impl From<u8> for Verbosity {
    fn from(level: u8) -> Self {
        match level {
            0 => Verbosity::Quiet,
            1 => Verbosity::Important,
            _ => Verbosity::All,
        }
    }
}

/// Asynchronous log sink with a single background writer.
pub struct Logger {
    verbosity: Verbosity,
    path: PathBuf,
    sender: Mutex<Option<Sender<LogEvent>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl Logger {
    /// Open (append) the log file and start the writer thread.
    pub fn new(path: impl AsRef<Path>, verbosity: Verbosity) -> Result<Self, MirrorError> {
        Self::start(path.as_ref(), verbosity, true)
    }

    /// Like [`Logger::new`] but only writes to the log file.
    pub fn file_only(path: impl AsRef<Path>, verbosity: Verbosity) -> Result<Self, MirrorError> {
        Self::start(path.as_ref(), verbosity, false)
    }

    fn start(path: &Path, verbosity: Verbosity, console: bool) -> Result<Self, MirrorError> {
        let log_file_error = |source| MirrorError::LogFile { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(log_file_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(log_file_error)?;

        let (tx, rx) = unbounded();
        let writer = thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || drain(rx, file, console))
            .map_err(log_file_error)?;

        Ok(Self {
            verbosity,
            path: path.to_path_buf(),
            sender: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Routine message, emitted at verbosity 2.
    pub fn log(&self, msg: impl Into<String>) {
        if self.verbosity >= Verbosity::All {
            self.enqueue(LogEvent::new(msg, Severity::Normal));
        }
    }

    /// Important message, emitted at verbosity 1 and above.
    pub fn log_important(&self, msg: impl Into<String>) {
        if self.verbosity >= Verbosity::Important {
            self.enqueue(LogEvent::new(msg, Severity::Normal));
        }
    }

    /// Error message, always emitted.
    pub fn log_error(&self, msg: impl Into<String>) {
        self.enqueue(LogEvent::new(msg, Severity::Error));
    }

    /// Stop accepting events, wait until every queued event is written and
    /// close the file. Calling it again is a no-op.
    pub fn shutdown(&self) {
        // Dropping the last sender ends the writer's receive loop once the
        // queue is empty.
        lock(&self.sender).take();

        if let Some(handle) = lock(&self.writer).take() {
            if handle.join().is_err() {
                Self::log_critical_error("log writer thread panicked");
            }
        }
    }

    /// Write straight to stderr, for failures before a logger exists.
    pub fn log_critical_error(msg: &str) {
        let line = LogEvent::new(msg, Severity::Error).format_line();
        let _ = io::stderr().lock().write_all(line.as_bytes());
    }

    fn enqueue(&self, event: LogEvent) {
        // The send happens under the lock so queue order matches the order
        // in which producers acquired it.
        if let Some(tx) = lock(&self.sender).as_ref() {
            let _ = tx.send(event);
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn drain(rx: Receiver<LogEvent>, file: File, console: bool) {
    let mut file = BufWriter::new(file);

    for event in rx.iter() {
        let line = event.format_line();

        if console {
            let _ = match event.severity {
                Severity::Error => io::stderr().lock().write_all(line.as_bytes()),
                Severity::Normal => io::stdout().lock().write_all(line.as_bytes()),
            };
        }

        if let Err(e) = file.write_all(line.as_bytes()) {
            Logger::log_critical_error(&format!("Failed to write log file: {}", e));
        }
        if rx.is_empty() {
            let _ = file.flush();
        }
    }

    let _ = file.flush();
}
