use std::os::fd::BorrowedFd;
use crate::report::Report;

/// Callback run at an open/close boundary.
///
/// Receives the socket's descriptor (valid for the duration of the call)
/// and the report passed to the operation that triggered it.
pub type Hook = Box<dyn Fn(BorrowedFd<'_>, &dyn Report) + Send + Sync>;

/// Ordered open/close notification lists.
///
/// Callbacks run in registration order. The socket invokes every one of
/// them itself, so a variant adding behavior never has to chain to a base
/// implementation.
#[derive(Default)]
pub(crate) struct Hooks {
	opened: Vec<Hook>,
	closed: Vec<Hook>,
}

impl Hooks {
	pub(crate) fn push_opened(&mut self, hook: Hook) {
		self.opened.push(hook);
	}

	pub(crate) fn push_closed(&mut self, hook: Hook) {
		self.closed.push(hook);
	}

	/// Runs after the handle is installed, before open returns.
	pub(crate) fn run_opened(&self, fd: BorrowedFd<'_>, report: &dyn Report) {
		for hook in &self.opened {
			hook(fd, report);
		}
	}

	/// Runs while the handle is still valid, before it is released.
	pub(crate) fn run_closed(&self, fd: BorrowedFd<'_>, report: &dyn Report) {
		for hook in &self.closed {
			hook(fd, report);
		}
	}

	pub(crate) fn counts(&self) -> (usize, usize) {
		(self.opened.len(), self.closed.len())
	}
}
