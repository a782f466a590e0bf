//! Log sink setup.
//!
//! Records go to stderr and are appended to a log file, `logs/app.log`
//! unless `LOG_FILE` names another path. The level defaults to `Info` and
//! `RUST_LOG` overrides it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use env_logger::Target;
use log::{info, warn};

pub const DEFAULT_LOG_FILE: &str = "logs/app.log";

/// Log file path, from `LOG_FILE` or the default.
pub fn log_file_path() -> PathBuf {
    std::env::var_os("LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Opens `path` for appending, creating its parent directory first.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global logger. A log file that cannot be opened leaves
/// stderr as the only sink.
pub fn init(log_file: &Path) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false);

    let file_error = match open_log_file(log_file) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(Tee::new(io::stderr(), file))));
            None
        }
        Err(e) => Some(e),
    };
    builder.init();

    match file_error {
        None => info!("Logging to {}", log_file.display()),
        Some(e) => warn!("Unable to open log file {}: {}", log_file.display(), e),
    }
}

/// Writes every buffer to both sinks.
struct Tee<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        self.secondary.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_tee_writes_both_sinks() {
        let mut tee = Tee::new(Vec::new(), Vec::new());

        write!(tee, "colorized {}", 1).unwrap();
        tee.flush().unwrap();

        assert_eq!(tee.primary, b"colorized 1");
        assert_eq!(tee.secondary, b"colorized 1");
    }

    #[test]
    fn test_open_log_file_creates_directory_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("app.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    #[serial]
    fn test_log_file_path_from_env() {
        std::env::remove_var("LOG_FILE");
        assert_eq!(log_file_path(), PathBuf::from(DEFAULT_LOG_FILE));

        std::env::set_var("LOG_FILE", "/var/log/colorizer.log");
        let path = log_file_path();
        std::env::remove_var("LOG_FILE");

        assert_eq!(path, PathBuf::from("/var/log/colorizer.log"));
    }
}
