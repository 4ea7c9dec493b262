//! Session log: one file per launch in the OS data directory
//! (`PicForge/picforge.log`), truncated on startup so it never grows across
//! sessions.  Logging failures are swallowed — a broken log must never take
//! the engine down with it.
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros from anywhere in
//! the crate.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

struct Sink {
    file: Mutex<File>,
    path: PathBuf,
}

static SINK: OnceLock<Sink> = OnceLock::new();

/// Where the current session is logging to, if the sink opened.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK.get().map(|s| &s.path)
}

/// Open (truncating) the session log and install a panic hook that mirrors
/// panic messages into it.  Safe to call once per process; later calls are
/// no-ops.
pub fn init() {
    let path = default_log_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let opened = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);
    let file = match opened {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] could not open {}: {}", path.display(), e);
            return;
        }
    };

    if SINK.set(Sink { file: Mutex::new(file), path }).is_err() {
        return;
    }

    if let Ok(since_epoch) = SystemTime::now().duration_since(UNIX_EPOCH) {
        emit(Level::Info, format_args!(
            "picforge session start (unix {})",
            since_epoch.as_secs()
        ));
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        emit(Level::Error, format_args!("panic: {}", info));
        previous(info);
    }));
}

/// Append one timestamped, level-tagged line.  No-op before `init` or when
/// the sink failed to open.
pub fn emit(level: Level, args: fmt::Arguments<'_>) {
    let Some(sink) = SINK.get() else { return };
    if let Ok(mut file) = sink.file.lock() {
        let _ = writeln!(file, "[{}] [{}] {}", clock(), level.tag(), args);
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Error, format_args!($($arg)*))
    };
}

fn default_log_path() -> PathBuf {
    data_dir().join("PicForge").join("picforge.log")
}

/// Per-platform user data directory, falling back to the working directory.
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(appdata) = std::env::var("APPDATA") {
        return PathBuf::from(appdata);
    }
    #[cfg(target_os = "macos")]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join("Library").join("Application Support");
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// Wall-clock HH:MM:SS within the current UTC day.
fn clock() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let s = d.as_secs() % 86400;
            format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
        }
        Err(_) => String::from("--:--:--"),
    }
}
