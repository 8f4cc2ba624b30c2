// Discovery log capture: mirrors all eprintln! output (the "Module: message"
// lines emitted by the pipeline stages, stores and providers) into a
// timestamped log file next to the journal data, while still reaching the
// terminal. One file per init:
//
//   <data dir>/com.mybloom.app/logs/mybloom-2026-08-23_14-30-00.log

use std::fs;
use std::io::{self, BufRead, Write};
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

const LOG_FILE_PREFIX: &str = "mybloom-";
const KEEP_LOG_FILES: usize = 5;

/// Initialize file logging. Call once at startup, before any eprintln! calls.
pub fn init(logs_dir: &Path) {
    INIT.call_once(|| {
        if let Err(e) = setup_logging(logs_dir) {
            eprintln!("Warning: Failed to initialize file logging: {}", e);
        }
    });
}

/// Fans one captured stderr line out to the terminal (verbatim) and to the
/// log file (stamped with wall-clock time, flushed per line so a crashed
/// pipeline run still leaves its trail).
struct TeeWriter<T: Write, L: Write> {
    terminal: T,
    log: L,
}

impl<T: Write, L: Write> TeeWriter<T, L> {
    fn new(terminal: T, log: L) -> Self {
        Self { terminal, log }
    }

    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.terminal, "{}", line);
        let ts = chrono::Local::now().format("%H:%M:%S%.3f");
        let _ = writeln!(self.log, "[{}] {}", ts, line);
        let _ = self.log.flush();
    }
}

/// Drain a line-oriented reader into the tee until EOF
fn pump<R: BufRead, T: Write, L: Write>(reader: R, tee: &mut TeeWriter<T, L>) {
    for line in reader.lines() {
        match line {
            Ok(line) => tee.write_line(&line),
            Err(_) => break,
        }
    }
}

fn setup_logging(logs_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(logs_dir)?;
    rotate_logs(logs_dir, KEEP_LOG_FILES)?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let log_file_path = logs_dir.join(format!("{}{}.log", LOG_FILE_PREFIX, timestamp));
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    eprintln!("Logging: Writing to {}", log_file_path.display());

    // Swap the stderr fd for the write end of a pipe; a background thread
    // pumps the read end through the tee. Everything the crate eprintln!s
    // after this point lands in both places with no further wiring.
    let mut pipe_fds = [0i32; 2];
    if unsafe { libc::pipe(pipe_fds.as_mut_ptr()) } != 0 {
        return Err("Failed to create pipe".into());
    }
    let (read_fd, write_fd) = (pipe_fds[0], pipe_fds[1]);

    let original_stderr_fd = unsafe { libc::dup(2) };
    if original_stderr_fd < 0 {
        return Err("Failed to dup stderr".into());
    }
    if unsafe { libc::dup2(write_fd, 2) } < 0 {
        return Err("Failed to redirect stderr".into());
    }
    unsafe { libc::close(write_fd) };

    let captured = io::BufReader::new(unsafe { fs::File::from_raw_fd(read_fd) });
    let terminal = unsafe { fs::File::from_raw_fd(original_stderr_fd) };
    let mut tee = TeeWriter::new(terminal, log_file);

    std::thread::spawn(move || pump(captured, &mut tee));

    Ok(())
}

/// Paths of this crate's log files beyond the `keep` most recent
fn expired_logs(logs_dir: &Path, keep: usize) -> Result<Vec<PathBuf>, io::Error> {
    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

    for entry in fs::read_dir(logs_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_ours = path.extension().and_then(|e| e.to_str()) == Some("log")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(LOG_FILE_PREFIX))
                .unwrap_or(false);
        if !is_ours {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
            log_files.push((path, modified));
        }
    }

    // Newest first; everything past `keep` expires
    log_files.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(log_files.into_iter().skip(keep).map(|(path, _)| path).collect())
}

/// Delete old log files, keeping the most recent `keep` files.
fn rotate_logs(logs_dir: &Path, keep: usize) -> Result<(), io::Error> {
    for path in expired_logs(logs_dir, keep)? {
        eprintln!("Logging: Removing old log {}", path.display());
        let _ = fs::remove_file(path);
    }
    Ok(())
}

/// Get the logs directory path.
pub fn logs_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("com.mybloom.app").join("logs"))
}
