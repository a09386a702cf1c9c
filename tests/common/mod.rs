#![allow(dead_code)]

use std::sync::{Mutex, Once};
use tcpsock::{Report, Severity};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging; `RUST_LOG` overrides the default filter.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

/// Report that keeps every message up to `Debug`.
#[derive(Default)]
pub struct RecordingReport {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl RecordingReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(severity, _)| *severity == Severity::Error)
            .map(|(_, message)| message)
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap().clear();
    }
}

impl Report for RecordingReport {
    fn max_severity(&self) -> Severity {
        Severity::Debug
    }

    fn write_log(&self, severity: Severity, message: &str) {
        self.lines.lock().unwrap().push((severity, message.to_owned()));
    }
}

/// True if `fd` refers to an open descriptor in this process.
pub fn fd_is_valid(fd: i32) -> bool {
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
}

/// Device and inode behind `fd`, or `None` if it is not open.
///
/// Other tests may reuse a released descriptor number at once; comparing
/// identities tells the original file from its successor.
pub fn fd_identity(fd: i32) -> Option<(u64, u64)> {
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd, &mut stat) } == -1 {
        return None;
    }
    Some((stat.st_dev as u64, stat.st_ino as u64))
}

/// True once the file `fd` referred to when `identity` was taken is gone.
pub fn fd_released(fd: i32, identity: (u64, u64)) -> bool {
    fd_identity(fd) != Some(identity)
}
