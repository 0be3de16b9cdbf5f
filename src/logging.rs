//! Process-global logging policy.
//!
//! The policy is deliberately process-wide, mirroring the historical
//! contract: one minimum priority, one optional handler. With no handler
//! installed the crate performs no logging I/O at all.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

/// Message priority. Messages above the configured minimum are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogPriority {
    /// Critical errors and application bugs.
    Error = 10,
    /// Informational messages.
    Info = 20,
    /// Debug chatter.
    Debug = 30,
}

/// A log sink: invoked with the priority, the source file and line the
/// message originates from, and the formatted message.
pub type LogHandler = Box<dyn Fn(LogPriority, &'static str, u32, fmt::Arguments<'_>) + Send + Sync>;

static PRIORITY: AtomicU8 = AtomicU8::new(LogPriority::Info as u8);

fn handler_cell() -> &'static Mutex<Option<LogHandler>> {
    static CELL: OnceLock<Mutex<Option<LogHandler>>> = OnceLock::new();
    CELL.get_or_init(|| Mutex::new(None))
}

/// Sets the process-wide minimum priority. Messages with a priority value
/// above it are dropped before reaching the handler.
pub fn set_log_priority(priority: LogPriority) {
    PRIORITY.store(priority as u8, Ordering::Relaxed);
}

/// The currently configured minimum priority.
pub fn log_priority() -> LogPriority {
    match PRIORITY.load(Ordering::Relaxed) {
        p if p <= LogPriority::Error as u8 => LogPriority::Error,
        p if p <= LogPriority::Info as u8 => LogPriority::Info,
        _ => LogPriority::Debug,
    }
}

/// Installs (or, with `None`, removes) the process-wide log handler.
///
/// No handler is installed by default and nothing is ever logged until one
/// is. Passing `None` restores that state.
pub fn set_log_handler(handler: Option<LogHandler>) {
    if let Ok(mut guard) = handler_cell().lock() {
        *guard = handler;
    }
}

/// Installs a handler that forwards messages to the [`log`] crate facade,
/// for applications that already run a `log`-based logger.
pub fn bridge_to_log() {
    set_log_handler(Some(Box::new(|priority, file, line, args| {
        let level = match priority {
            LogPriority::Error => log::Level::Error,
            LogPriority::Info => log::Level::Info,
            LogPriority::Debug => log::Level::Debug,
        };
        log::logger().log(
            &log::Record::builder()
                .args(args)
                .level(level)
                .target("evmirror")
                .file(Some(file))
                .line(Some(line))
                .build(),
        );
    })));
}

pub(crate) fn dispatch(priority: LogPriority, file: &'static str, line: u32, args: fmt::Arguments<'_>) {
    if priority as u8 > PRIORITY.load(Ordering::Relaxed) {
        return;
    }
    if let Ok(guard) = handler_cell().lock() {
        if let Some(handler) = guard.as_ref() {
            handler(priority, file, line, args);
        }
    }
}

macro_rules! log_msg {
    ($prio:ident, $($arg:tt)*) => {
        $crate::logging::dispatch(
            $crate::logging::LogPriority::$prio,
            file!(),
            line!(),
            format_args!($($arg)*),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn priority_filter_and_reset() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        set_log_handler(Some(Box::new(move |_, _, _, _| {
            hits2.fetch_add(1, Ordering::SeqCst);
        })));
        set_log_priority(LogPriority::Error);

        log_msg!(Debug, "dropped");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        log_msg!(Error, "kept");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        set_log_priority(LogPriority::Debug);
        log_msg!(Debug, "kept now: {}", 42);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // Removing the handler silences everything again.
        set_log_handler(None);
        log_msg!(Error, "nobody home");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        set_log_priority(LogPriority::Info);
    }
}
