use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::paths::vslot_log_dir;

const SESSION_PREFIX: &str = "session-";

fn level_char(level: Level) -> char {
    match level {
        Level::Error => 'E',
        Level::Warn => 'W',
        Level::Info => 'I',
        Level::Debug => 'D',
        Level::Trace => 'T',
    }
}

fn format_line(record: &Record) -> String {
    format!(
        "{} {} {} {}\n",
        Local::now().format("%H:%M:%S%.3f"),
        level_char(record.level()),
        record.target(),
        record.args()
    )
}

fn session_number(name: &str) -> Option<u32> {
    name.strip_prefix(SESSION_PREFIX)?.parse().ok()
}

fn session_dirs(log_dir: &Path) -> Vec<(u32, PathBuf)> {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let num = session_number(&entry.file_name().to_string_lossy())?;
            Some((num, entry.path()))
        })
        .collect()
}

fn open_append(path: &Path, truncate: bool) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(!truncate)
        .truncate(truncate)
        .open(path)
}

/// Daemon logger. Info and above go to `vslotd.log`, debug and trace to
/// `vslotd.dbg.log`, and every line is echoed to stderr.
pub struct FileLogger {
    level: LevelFilter,
    main_file: Mutex<File>,
    debug_file: Mutex<File>,
}

impl FileLogger {
    pub fn init(level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
        let log_dir = vslot_log_dir();
        fs::create_dir_all(&log_dir)?;

        let session_num = Self::next_session_number(&log_dir);
        let session_dir = log_dir.join(format!("{}{}", SESSION_PREFIX, session_num));
        fs::create_dir_all(&session_dir)?;

        let logger = FileLogger {
            level,
            main_file: Mutex::new(open_append(&session_dir.join("vslotd.log"), true)?),
            debug_file: Mutex::new(open_append(&session_dir.join("vslotd.dbg.log"), true)?),
        };

        log::set_max_level(level);
        log::set_logger(Box::leak(Box::new(logger)))
            .map_err(|e| format!("Failed to set logger: {}", e))?;

        log::info!("=== vslotd session {} ===", session_num);
        log::info!("Log directory: {}", session_dir.display());
        log::info!("Started at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

        Ok(())
    }

    fn next_session_number(log_dir: &Path) -> u32 {
        session_dirs(log_dir)
            .into_iter()
            .map(|(num, _)| num)
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl log::Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(record);
        let file = match record.level() {
            Level::Debug | Level::Trace => &self.debug_file,
            _ => &self.main_file,
        };

        if let Ok(mut file) = file.lock() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }

        eprint!("{}", line);
    }

    fn flush(&self) {
        let _ = self.main_file.lock().map(|mut f| f.flush());
        let _ = self.debug_file.lock().map(|mut f| f.flush());
    }
}

/// Client logger that appends `<app>.log` into the newest daemon session.
pub struct AppLogger {
    file: Mutex<File>,
    app_name: String,
}

impl AppLogger {
    pub fn init(app_name: &str) -> Result<(), Box<dyn std::error::Error>> {
        let session_dir = session_dirs(&vslot_log_dir())
            .into_iter()
            .max_by_key(|(num, _)| *num)
            .map(|(_, path)| path)
            .ok_or("No vslotd session found")?;

        let logger = AppLogger {
            file: Mutex::new(open_append(
                &session_dir.join(format!("{}.log", app_name)),
                false,
            )?),
            app_name: app_name.to_string(),
        };

        log::set_max_level(LevelFilter::Debug);
        log::set_logger(Box::leak(Box::new(logger)))
            .map_err(|e| format!("Failed to set logger: {}", e))?;

        Ok(())
    }
}

impl log::Log for AppLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(record);

        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }

        if record.level() <= Level::Warn {
            eprint!("[{}] {}", self.app_name, line);
        }
    }

    fn flush(&self) {
        let _ = self.file.lock().map(|mut f| f.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_number() {
        assert_eq!(session_number("session-12"), Some(12));
        assert_eq!(session_number("session-"), None);
        assert_eq!(session_number("vslotd.log"), None);
    }

    #[test]
    fn test_level_chars() {
        assert_eq!(level_char(Level::Error), 'E');
        assert_eq!(level_char(Level::Trace), 'T');
    }
}
