use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DIAG_MAX_BYTES: u64 = 5 * 1024 * 1024;
const DIAG_BACKUPS: usize = 3;
const PERF_MAX_BYTES: u64 = 2 * 1024 * 1024;
const PERF_BACKUPS: usize = 2;

/// Append-only file that rotates to numbered backups (`<name>.1` is the
/// most recent) once a write would push it past `max_bytes`.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn new(path: PathBuf, max_bytes: u64, backups: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backups,
            file,
            written,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }
        let oldest = backup_path(&self.path, self.backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for i in (1..self.backups).rev() {
            let from = backup_path(&self.path, i);
            if from.exists() {
                fs::rename(&from, backup_path(&self.path, i + 1))?;
            }
        }
        fs::rename(&self.path, backup_path(&self.path, 1))?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Cloneable handle over a shared `RotatingFile`, usable as a
/// `tracing_subscriber` writer.
#[derive(Clone)]
pub struct RotatingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl RotatingWriter {
    pub fn new(path: PathBuf, max_bytes: u64, backups: usize) -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(RotatingFile::new(path, max_bytes, backups)?)),
        })
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Initialize process-wide diagnostic logging: a stderr layer at the
/// configured level (overridable via RUST_LOG) plus a rotating file layer
/// kept at DEBUG so the file always has full detail.
pub fn init(log_dir: &Path, log_file: &str, level: &str) -> Result<()> {
    let log_path = log_dir.join(log_file);
    let file_writer = RotatingWriter::new(log_path.clone(), DIAG_MAX_BYTES, DIAG_BACKUPS)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let console_level: LevelFilter = level.parse().unwrap_or(LevelFilter::INFO);
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(LevelFilter::DEBUG),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    tracing::info!("Main logging initialized: {}", log_path.display());
    Ok(())
}

/// Destination for performance timing lines. Injected into the pipeline so
/// core logic can be tested with an in-memory sink.
pub trait TimingSink {
    fn record(&self, message: &str);
}

/// File-backed timing sink: `performance.log` under the log directory,
/// rotated at 2 MiB with 2 backups.
pub struct PerfLog {
    file: Mutex<RotatingFile>,
}

impl PerfLog {
    pub fn open(log_dir: &Path) -> Result<Self> {
        let path = log_dir.join("performance.log");
        let file = RotatingFile::new(path.clone(), PERF_MAX_BYTES, PERF_BACKUPS)
            .with_context(|| format!("Failed to open performance log {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl TimingSink for PerfLog {
    fn record(&self, message: &str) {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        // Timing data is best-effort, never worth failing the run over.
        let _ = writeln!(file, "{ts} - {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_produces_numbered_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotate.log");
        let mut file = RotatingFile::new(path.clone(), 32, 2).unwrap();

        let line = [b'x'; 20];
        file.write_all(&line).unwrap(); // fits
        file.write_all(&line).unwrap(); // rotates first
        file.write_all(&line).unwrap(); // rotates again
        file.flush().unwrap();

        assert!(path.exists());
        assert!(backup_path(&path, 1).exists());
        assert!(backup_path(&path, 2).exists());
        assert_eq!(fs::metadata(&path).unwrap().len(), 20);
    }

    #[test]
    fn rotation_caps_backup_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotate.log");
        let mut file = RotatingFile::new(path.clone(), 8, 1).unwrap();

        for _ in 0..4 {
            file.write_all(b"12345678").unwrap();
        }
        file.flush().unwrap();

        assert!(backup_path(&path, 1).exists());
        assert!(!backup_path(&path, 2).exists());
    }

    #[test]
    fn perf_log_appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let perf = PerfLog::open(dir.path()).unwrap();

        perf.record("Time to parse log: 0.0012 sec");
        perf.record("Total analysis time: 1.5000 sec");

        let contents = fs::read_to_string(dir.path().join("performance.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Time to parse log: 0.0012 sec"));
        assert!(lines[1].ends_with("Total analysis time: 1.5000 sec"));
    }
}
