use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Sends records to the console logger and appends them to a log file.
struct TeeLogger<L: Log> {
    console: L,
    file: Mutex<File>,
}

impl<L: Log> TeeLogger<L> {
    fn file_accepts(&self, metadata: &Metadata) -> bool {
        accepts_for_file(metadata.level(), metadata.target())
    }
}

/// Everything from this crate at debug and above; dependencies only from info up.
fn accepts_for_file(level: Level, target: &str) -> bool {
    level <= Level::Info || (level <= Level::Debug && target.starts_with(env!("CARGO_PKG_NAME")))
}

fn format_line(now: &NaiveDateTime, level: Level, message: &std::fmt::Arguments) -> String {
    format!("{} - {level} - {message}", now.format("%Y-%m-%d %H:%M:%S,%3f"))
}

impl<L: Log> Log for TeeLogger<L> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || self.file_accepts(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console.enabled(record.metadata()) {
            self.console.log(record);
        }
        if self.file_accepts(record.metadata()) {
            let line = format_line(&chrono::Local::now().naive_local(), record.level(), record.args());
            if let Ok(mut file) = self.file.lock() {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Install the process logger: env_logger on the console (bridged so it plays
/// nice with progress bars) and an append-only log file.
pub fn init(multi: &MultiProgress, verbose: bool, log_file: &Path) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let console =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .build();
    let console_level: LevelFilter = console.filter();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let logger = TeeLogger {
        console: LogWrapper::new(multi.clone(), console),
        file: Mutex::new(file),
    };
    log::set_boxed_logger(Box::new(logger)).context("Failed to install logger")?;
    log::set_max_level(console_level.max(LevelFilter::Debug));
    Ok(())
}
