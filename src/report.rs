//! Severity-based diagnostic reporting.
//!
//! Every socket operation takes a `&dyn Report`. When a system call fails
//! the socket formats a message (always including the OS error code) and
//! logs it at `Severity::Error`; the sink decides whether to emit it.

use std::sync::atomic::{AtomicU8, Ordering};

/// Importance of a diagnostic message.
///
/// Ordered from most to least important: `Fatal < Severe < ... < Debug`.
/// A sink with maximum severity `Info` emits `Fatal` through `Info` and
/// drops `Verbose` and `Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
	Fatal = 0,
	Severe = 1,
	Error = 2,
	Warning = 3,
	Info = 4,
	Verbose = 5,
	Debug = 6,
}

impl Severity {
	/// Line prefix used by text sinks. Empty for `Info` and `Verbose`.
	pub fn header(self) -> &'static str {
		match self {
			Severity::Fatal => "FATAL ERROR: ",
			Severity::Severe => "SEVERE ERROR: ",
			Severity::Error => "Error: ",
			Severity::Warning => "Warning: ",
			Severity::Info | Severity::Verbose => "",
			Severity::Debug => "Debug: ",
		}
	}

	fn from_u8(value: u8) -> Self {
		match value {
			0 => Severity::Fatal,
			1 => Severity::Severe,
			2 => Severity::Error,
			3 => Severity::Warning,
			4 => Severity::Info,
			5 => Severity::Verbose,
			_ => Severity::Debug,
		}
	}
}

/// A destination for diagnostics.
///
/// Implementors provide `max_severity` and `write_log`; `log` does the
/// filtering. Sinks are shared by reference, so any mutable state they keep
/// needs interior mutability.
pub trait Report {
	/// Least important severity that is still emitted.
	fn max_severity(&self) -> Severity;

	/// Emits a message that already passed the severity filter.
	fn write_log(&self, severity: Severity, message: &str);

	/// Logs a message if `severity` is within `max_severity`.
	fn log(&self, severity: Severity, message: &str) {
		if severity <= self.max_severity() {
			self.write_log(severity, message);
		}
	}

	fn error(&self, message: &str) {
		self.log(Severity::Error, message);
	}

	fn warning(&self, message: &str) {
		self.log(Severity::Warning, message);
	}

	fn info(&self, message: &str) {
		self.log(Severity::Info, message);
	}

	fn verbose(&self, message: &str) {
		self.log(Severity::Verbose, message);
	}

	fn debug(&self, message: &str) {
		self.log(Severity::Debug, message);
	}
}

/// Discards everything. Used on the drop path where nobody is listening.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReport;

impl Report for NullReport {
	fn max_severity(&self) -> Severity {
		Severity::Fatal
	}

	fn write_log(&self, _severity: Severity, _message: &str) {}

	fn log(&self, _severity: Severity, _message: &str) {}
}

/// Atomic severity threshold shared by the filtering sinks.
#[derive(Debug)]
struct Threshold(AtomicU8);

impl Threshold {
	fn new(level: Severity) -> Self {
		Self(AtomicU8::new(level as u8))
	}

	fn get(&self) -> Severity {
		Severity::from_u8(self.0.load(Ordering::Relaxed))
	}

	fn set(&self, level: Severity) {
		self.0.store(level as u8, Ordering::Relaxed);
	}

	fn raise(&self, level: Severity) {
		self.0.fetch_max(level as u8, Ordering::Relaxed);
	}
}

/// Forwards diagnostics to `tracing`.
///
/// Severity maps onto tracing levels: `Fatal`/`Severe`/`Error` → ERROR,
/// `Warning` → WARN, `Info` → INFO, `Verbose` → DEBUG, `Debug` → TRACE.
/// The default threshold is `Info`.
#[derive(Debug)]
pub struct TracingReport {
	max: Threshold,
}

impl TracingReport {
	pub fn new(max_severity: Severity) -> Self {
		Self { max: Threshold::new(max_severity) }
	}

	pub fn set_max_severity(&self, level: Severity) {
		self.max.set(level);
		if level >= Severity::Debug {
			self.debug("debug level set");
		}
	}

	/// Only ever makes the sink more verbose.
	pub fn raise_max_severity(&self, level: Severity) {
		self.max.raise(level);
	}
}

impl Default for TracingReport {
	fn default() -> Self {
		Self::new(Severity::Info)
	}
}

impl Report for TracingReport {
	fn max_severity(&self) -> Severity {
		self.max.get()
	}

	fn write_log(&self, severity: Severity, message: &str) {
		match severity {
			Severity::Fatal | Severity::Severe => {
				tracing::error!(severity = ?severity, "{}", message)
			}
			Severity::Error => tracing::error!("{}", message),
			Severity::Warning => tracing::warn!("{}", message),
			Severity::Info => tracing::info!("{}", message),
			Severity::Verbose => tracing::debug!("{}", message),
			Severity::Debug => tracing::trace!("{}", message),
		}
	}
}

/// Prints `header + message` on standard error.
#[derive(Debug)]
pub struct StderrReport {
	max: Threshold,
}

impl StderrReport {
	pub fn new(max_severity: Severity) -> Self {
		Self { max: Threshold::new(max_severity) }
	}

	pub fn set_max_severity(&self, level: Severity) {
		self.max.set(level);
	}

	pub fn raise_max_severity(&self, level: Severity) {
		self.max.raise(level);
	}
}

impl Default for StderrReport {
	fn default() -> Self {
		Self::new(Severity::Info)
	}
}

impl Report for StderrReport {
	fn max_severity(&self) -> Severity {
		self.max.get()
	}

	fn write_log(&self, severity: Severity, message: &str) {
		eprintln!("{}{}", severity.header(), message);
	}
}
