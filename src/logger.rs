use std::fs::File;
use std::io::{Result as IoResult, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::{cell::RefCell, fmt::Display};

static LOG_FILE: OnceLock<Arc<Mutex<File>>> = OnceLock::new();
thread_local! {
    static LOG_PREFIX: RefCell<Option<String>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Warn,
    Error,
}

impl Level {
    const fn tag(self) -> &'static str {
        match self {
            Self::Warn => "warning",
            Self::Error => "error",
        }
    }
}

fn current_prefix() -> Option<String> {
    LOG_PREFIX.with(|prefix| prefix.borrow().clone())
}

fn format_with_prefix(message: impl Display) -> String {
    current_prefix().map_or_else(|| message.to_string(), |p| format!("{p}: {message}"))
}

fn emit(level: Level, message: &str) {
    let message = format_with_prefix(message);
    eprintln!("{}: {message}", level.tag());
    if let Some(writer) = LOG_FILE.get()
        && let Ok(mut file) = writer.lock()
    {
        let _ = writeln!(file, "{}: {message}", level.tag());
    }
}

/// Mirrors decoder warnings and errors into `path` in addition to stderr.
///
/// # Errors
///
/// Returns an error if the log file cannot be created.
pub fn set_log_file(path: &Path) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    // First writer wins.
    let _ = LOG_FILE.set(Arc::new(Mutex::new(file)));
    Ok(())
}

/// Sets a thread-local prefix (typically the file being decoded) that is
/// prepended to subsequent messages. The previous prefix is restored when the
/// returned guard is dropped.
pub fn set_log_prefix(prefix: impl Into<String>) -> LogPrefixGuard {
    let previous = LOG_PREFIX.with(|slot| slot.borrow_mut().replace(prefix.into()));
    LogPrefixGuard { previous }
}

pub struct LogPrefixGuard {
    previous: Option<String>,
}

impl Drop for LogPrefixGuard {
    fn drop(&mut self) {
        let prev = self.previous.take();
        LOG_PREFIX.with(|slot| {
            *slot.borrow_mut() = prev;
        });
    }
}

pub fn log_warn(message: &str) {
    emit(Level::Warn, message);
}

pub fn log_error(message: &str) {
    emit(Level::Error, message);
}
