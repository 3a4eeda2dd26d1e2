//! Process-wide logging: one line per event, to stderr and to the log file.
//!
//! ```text
//! [2026-03-01 14:15:02] [INFO] Update available: 0.2.2 -> 0.2.3
//! [2026-03-01 14:15:40] [WARNING] failed to create portable archive error=...
//! ```
//!
//! The filter defaults to `info` and is overridden by `UPKEEP_LOG`
//! (`EnvFilter` syntax). The file is append-only; once it reaches 10 MiB it
//! is shifted to `update.log.1` at the next start, keeping five copies.

use std::fmt::{self, Write as _};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::error::{io_err, UpdateError};

/// Environment variable holding the log filter.
pub const FILTER_ENV: &str = "UPKEEP_LOG";

const SEPARATOR_WIDTH: usize = 60;

const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEPT_COPIES: usize = 5;

/// Renders `[YYYY-MM-DD HH:MM:SS] [LEVEL] message key=value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut line = LineVisitor::default();
        event.record(&mut line);
        write!(
            writer,
            "[{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level_label(event.metadata().level()),
            line.message
        )?;
        if !line.fields.is_empty() {
            write!(writer, "{}", line.fields)?;
        }
        writeln!(writer)
    }
}

fn level_label(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        _ => "DEBUG",
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Open `path` for appending, creating parent directories.
fn open_append(path: &Path) -> Result<File, UpdateError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))
}

/// `update.log` -> `update.log.<n>`.
fn copy_path(log: &Path, n: usize) -> PathBuf {
    let mut name = log.file_name().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(format!(".{n}"));
    log.with_file_name(name)
}

/// Move an oversized log to `<log>.1`, shifting older copies up by one.
///
/// A rename replaces its destination, so the copy past `keep` is dropped by
/// the first shift. Returns whether the log moved.
fn rotate(log: &Path, limit: u64, keep: usize) -> io::Result<bool> {
    let len = match fs::metadata(log) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if keep == 0 || len < limit {
        return Ok(false);
    }
    for n in (1..keep).rev() {
        match fs::rename(copy_path(log, n), copy_path(log, n + 1)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
            _ => {}
        }
    }
    fs::rename(log, copy_path(log, 1))?;
    Ok(true)
}

/// Subscriber writing only to `path`, not installed.
///
/// Scope it with `tracing::subscriber::with_default`.
pub fn file_subscriber(path: &Path) -> Result<impl Subscriber + Send + Sync, UpdateError> {
    let file = open_append(path)?;
    Ok(tracing_subscriber::registry().with(filter()).with(
        tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_ansi(false)
            .with_writer(Mutex::new(file)),
    ))
}

/// Install the process-wide subscriber: stderr plus `log_file`.
///
/// Rotates the log first. Installing twice is a no-op.
pub fn init(log_file: &Path) -> Result<(), UpdateError> {
    let rotated = rotate(log_file, ROTATE_AT_BYTES, KEPT_COPIES);
    let file = open_append(log_file)?;

    let subscriber = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(LineFormat)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(LineFormat)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        );
    let _ = tracing::subscriber::set_global_default(subscriber);

    match rotated {
        Ok(true) => tracing::info!(path = %log_file.display(), "log file rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %log_file.display(), error = %err, "log rotation failed"),
    }
    Ok(())
}

/// Writes the session banner now and the closing separator on drop.
#[must_use = "the closing separator is written when the banner is dropped"]
pub struct SessionBanner(());

impl Drop for SessionBanner {
    fn drop(&mut self) {
        tracing::info!("{}", "=".repeat(SEPARATOR_WIDTH));
    }
}

pub fn session_banner(mode: &str) -> SessionBanner {
    let rule = "=".repeat(SEPARATOR_WIDTH);
    tracing::info!("{rule}");
    tracing::info!("upkeep v{} ({mode})", env!("CARGO_PKG_VERSION"));
    tracing::info!("{rule}");
    SessionBanner(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn capture(f: impl FnOnce()) -> String {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/update.log");
        let subscriber = file_subscriber(&path).unwrap();
        tracing::subscriber::with_default(subscriber, f);
        std::fs::read_to_string(&path).unwrap()
    }

    fn strip_timestamp(line: &str) -> &str {
        // "[YYYY-MM-DD HH:MM:SS] " is 22 bytes.
        &line[22..]
    }

    #[test]
    fn lines_carry_timestamp_level_and_message() {
        let log = capture(|| {
            tracing::info!("Current version: 0.2.2");
            tracing::warn!("no release tags found");
            tracing::error!("Build failed");
        });
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert_eq!(&lines[0][20..22], "] ");
        assert_eq!(strip_timestamp(lines[0]), "[INFO] Current version: 0.2.2");
        assert_eq!(strip_timestamp(lines[1]), "[WARNING] no release tags found");
        assert_eq!(strip_timestamp(lines[2]), "[ERROR] Build failed");
    }

    #[test]
    fn structured_fields_follow_the_message() {
        let log = capture(|| {
            let path = "backup/v0.2.2";
            tracing::info!(files = 3, path = %path, "backup created");
        });
        assert_eq!(
            strip_timestamp(log.trim_end()),
            "[INFO] backup created files=3 path=backup/v0.2.2"
        );
    }

    #[test]
    fn debug_is_filtered_by_default() {
        if std::env::var_os(FILTER_ENV).is_some() {
            return;
        }
        let log = capture(|| tracing::debug!("noise"));
        assert!(log.is_empty());
    }

    const SMALL_LIMIT: u64 = 64;

    fn oversized(path: &Path) {
        fs::write(path, vec![b'x'; SMALL_LIMIT as usize]).unwrap();
    }

    #[test]
    fn short_log_stays_in_place() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("update.log");
        fs::write(&log, "[INFO] started\n").unwrap();
        assert!(!rotate(&log, SMALL_LIMIT, KEPT_COPIES).unwrap());
        assert!(log.exists());
        assert!(!copy_path(&log, 1).exists());
    }

    #[test]
    fn missing_log_does_not_rotate() {
        let dir = TempDir::new().unwrap();
        assert!(!rotate(&dir.path().join("update.log"), SMALL_LIMIT, KEPT_COPIES).unwrap());
    }

    #[test]
    fn oversized_log_becomes_the_first_copy() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("update.log");
        oversized(&log);
        assert!(rotate(&log, SMALL_LIMIT, KEPT_COPIES).unwrap());
        assert!(!log.exists());
        assert_eq!(fs::metadata(copy_path(&log, 1)).unwrap().len(), SMALL_LIMIT);
    }

    #[test]
    fn oldest_copy_falls_off() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("update.log");
        for n in 1..=KEPT_COPIES {
            fs::write(copy_path(&log, n), format!("copy-{n}")).unwrap();
        }
        oversized(&log);

        assert!(rotate(&log, SMALL_LIMIT, KEPT_COPIES).unwrap());
        assert_eq!(fs::read_to_string(copy_path(&log, 2)).unwrap(), "copy-1");
        assert_eq!(
            fs::read_to_string(copy_path(&log, KEPT_COPIES)).unwrap(),
            format!("copy-{}", KEPT_COPIES - 1)
        );
        assert!(!copy_path(&log, KEPT_COPIES + 1).exists());
    }

    #[test]
    fn copies_sit_beside_the_log() {
        assert_eq!(
            copy_path(Path::new("/srv/app/update.log"), 3),
            PathBuf::from("/srv/app/update.log.3")
        );
    }

    #[test]
    fn banner_brackets_the_session() {
        let log = capture(|| {
            let _banner = session_banner("update");
            tracing::info!("working");
        });
        let lines: Vec<&str> = log.lines().map(strip_timestamp).collect();
        let rule = format!("[INFO] {}", "=".repeat(SEPARATOR_WIDTH));
        assert_eq!(lines.first().copied(), Some(rule.as_str()));
        assert!(lines[1].starts_with("[INFO] upkeep v"));
        assert_eq!(lines.last().copied(), Some(rule.as_str()));
    }
}
