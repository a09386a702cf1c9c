use std::fmt;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use crate::addr::{SocketAddress, ToSockAddr, read_sockaddr};
use crate::error::{SocketError, errno};
use crate::report::{NullReport, Report};
use super::config::SocketConfig;
use super::hooks::{Hook, Hooks};
use super::options::{self, Linger};

/// Value returned by `raw_handle()` when the socket is closed.
pub const INVALID_HANDLE: RawFd = -1;

/// Shared ownership of a socket.
///
/// The descriptor is closed when the last clone is dropped. `Arc`'s
/// reference count is independent of the socket's own lock.
pub type SocketPtr = Arc<Socket>;

/// A TCP/IPv4 socket owning at most one OS descriptor.
///
/// Starts closed. `open()` creates the descriptor, `close()` or drop
/// releases it. Every state-changing operation serializes on a
/// per-socket mutex; `is_open()` and `raw_handle()` are lock-free.
///
/// Failures are logged at `Severity::Error` on the `Report` passed to the
/// operation and returned to the caller.
///
/// Variants (servers, sessions) customize the open/close boundary by
/// registering hooks with `on_opened()` / `on_closed()`.
pub struct Socket {
	state: Mutex<State>,
	/// Mirror of the owned descriptor, written only under `state`.
	handle: AtomicI32,
}

struct State {
	fd: Option<OwnedFd>,
	hooks: Hooks,
}

impl Socket {
	/// Creates a closed socket.
	pub fn new() -> Self {
		Self {
			state: Mutex::new(State { fd: None, hooks: Hooks::default() }),
			handle: AtomicI32::new(INVALID_HANDLE),
		}
	}

	/// Creates a closed socket behind an `Arc`.
	pub fn shared() -> SocketPtr {
		Arc::new(Self::new())
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		// State is consistent between statements, a panicking hook leaves it usable.
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Registers a callback run after every successful open, including
	/// opens performed by a server on accept.
	///
	/// Hooks run with the socket lock held: they must not call methods of
	/// the same socket. Registering while open does not fire the hook for
	/// the current descriptor.
	pub fn on_opened<F>(&self, hook: F)
	where
		F: Fn(BorrowedFd<'_>, &dyn Report) + Send + Sync + 'static,
	{
		self.lock().hooks.push_opened(Box::new(hook) as Hook);
	}

	/// Registers a callback run on every transition from open to closed,
	/// before the descriptor is released. Same locking rule as `on_opened`.
	/// The socket already reports closed while these hooks run.
	pub fn on_closed<F>(&self, hook: F)
	where
		F: Fn(BorrowedFd<'_>, &dyn Report) + Send + Sync + 'static,
	{
		self.lock().hooks.push_closed(Box::new(hook) as Hook);
	}

	/// Opens the socket.
	///
	/// Fails if the socket is already open or the kernel refuses to create
	/// a descriptor (e.g. `EMFILE`).
	pub fn open(&self, report: &dyn Report) -> Result<(), SocketError> {
		let mut state = self.lock();
		if state.fd.is_some() {
			return Err(fail(report, SocketError::AlreadyOpen));
		}

		let fd = unsafe {
			libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, libc::IPPROTO_TCP)
		};
		if fd == -1 {
			return Err(fail(report, SocketError::Create { errno: errno() }));
		}
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };

		self.install(&mut state, fd, report);
		Ok(())
	}

	/// Installs a descriptor accepted by a server, running the same
	/// `opened` hooks as `open()`.
	///
	/// If this socket is already open, `fd` is closed and an error returned.
	pub(crate) fn declare_opened(&self, fd: OwnedFd, report: &dyn Report) -> Result<(), SocketError> {
		let mut state = self.lock();
		if state.fd.is_some() {
			drop(fd);
			return Err(fail(report, SocketError::AlreadyOpen));
		}
		self.install(&mut state, fd, report);
		Ok(())
	}

	fn install(&self, state: &mut State, fd: OwnedFd, report: &dyn Report) {
		let raw = fd.as_raw_fd();
		let State { fd: slot, hooks } = state;
		let fd = slot.insert(fd);
		self.handle.store(raw, Ordering::Release);
		tracing::debug!(fd = raw, "socket opened");
		hooks.run_opened(fd.as_fd(), report);
	}

	/// Closes the socket. Succeeds with no effect when already closed.
	///
	/// If the kernel reports an error on close, the descriptor is released
	/// anyway and the socket is closed; the error is still returned.
	pub fn close(&self, report: &dyn Report) -> Result<(), SocketError> {
		let mut state = self.lock();
		close_locked(&mut state, &self.handle, report)
	}

	/// True while the socket owns a descriptor.
	#[inline]
	pub fn is_open(&self) -> bool {
		self.raw_handle() != INVALID_HANDLE
	}

	/// Returns the descriptor, or `INVALID_HANDLE` if closed.
	///
	/// The socket keeps ownership: do not close or duplicate it.
	#[inline]
	pub fn raw_handle(&self) -> RawFd {
		self.handle.load(Ordering::Acquire)
	}

	/// Runs `f` on the open descriptor with the lock held.
	///
	/// Fails with `NotOpen` when closed. Any error is logged to `report`.
	pub(crate) fn with_open_fd<T, F>(
		&self,
		operation: &'static str,
		report: &dyn Report,
		f: F,
	) -> Result<T, SocketError>
	where
		F: FnOnce(BorrowedFd<'_>) -> Result<T, SocketError>,
	{
		let state = self.lock();
		let result = match state.fd.as_ref() {
			Some(fd) => f(fd.as_fd()),
			None => Err(SocketError::NotOpen { operation }),
		};
		result.map_err(|err| fail(report, err))
	}

	pub fn set_send_buffer_size(&self, size: usize, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("send buffer size", report, |fd| {
			report.debug(&format!("setting socket send buffer size to {}", size));
			options::set_send_buffer_size(fd, size)
		})
	}

	pub fn set_receive_buffer_size(&self, size: usize, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("receive buffer size", report, |fd| {
			report.debug(&format!("setting socket receive buffer size to {}", size));
			options::set_recv_buffer_size(fd, size)
		})
	}

	/// Allows this socket to bind a port other sockets also bind.
	///
	/// Must be called before `bind()`; setting it afterwards has no effect
	/// on a bind that already failed.
	pub fn reuse_port(&self, active: bool, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("reuse port", report, |fd| {
			report.debug(&format!("setting socket reuse port to {}", active));
			options::set_reuse_port(fd, active)
		})
	}

	/// Sets the maximum number of router hops for outgoing packets.
	pub fn set_ttl(&self, ttl: u32, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("TTL", report, |fd| {
			report.debug(&format!("setting socket TTL to {}", ttl));
			options::set_ttl(fd, ttl)
		})
	}

	pub fn set_linger(&self, linger: Linger, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("linger time", report, |fd| {
			report.debug(&format!("setting socket linger to {:?}", linger));
			options::set_linger(fd, linger)
		})
	}

	/// Same as `set_linger(Linger::Disabled)`.
	pub fn set_no_linger(&self, report: &dyn Report) -> Result<(), SocketError> {
		self.set_linger(Linger::Disabled, report)
	}

	/// Same as `set_linger(Linger::Seconds(seconds))`.
	pub fn set_linger_time(&self, seconds: u32, report: &dyn Report) -> Result<(), SocketError> {
		self.set_linger(Linger::Seconds(seconds), report)
	}

	pub fn set_keep_alive(&self, active: bool, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("keep alive", report, |fd| {
			report.debug(&format!("setting socket keep alive to {}", active));
			options::set_keepalive(fd, active)
		})
	}

	/// When active, small writes are sent at once instead of being
	/// coalesced (disables Nagle's algorithm).
	pub fn set_no_delay(&self, active: bool, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("no delay", report, |fd| {
			report.debug(&format!("setting socket no delay to {}", active));
			options::set_nodelay(fd, active)
		})
	}

	/// Applies every option set in `config`, under a single lock.
	///
	/// Port reuse goes first so that a following `bind()` honors it.
	/// Stops at the first failing option.
	pub fn apply(&self, config: &SocketConfig, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("apply configuration", report, |fd| {
			if let Some(active) = config.reuse_port {
				report.debug(&format!("setting socket reuse port to {}", active));
				options::set_reuse_port(fd, active)?;
			}
			if let Some(size) = config.send_buffer_size {
				report.debug(&format!("setting socket send buffer size to {}", size));
				options::set_send_buffer_size(fd, size)?;
			}
			if let Some(size) = config.receive_buffer_size {
				report.debug(&format!("setting socket receive buffer size to {}", size));
				options::set_recv_buffer_size(fd, size)?;
			}
			if let Some(ttl) = config.ttl {
				report.debug(&format!("setting socket TTL to {}", ttl));
				options::set_ttl(fd, ttl)?;
			}
			if let Some(linger) = config.linger {
				report.debug(&format!("setting socket linger to {:?}", linger));
				options::set_linger(fd, linger)?;
			}
			if let Some(active) = config.keep_alive {
				report.debug(&format!("setting socket keep alive to {}", active));
				options::set_keepalive(fd, active)?;
			}
			if let Some(active) = config.no_delay {
				report.debug(&format!("setting socket no delay to {}", active));
				options::set_nodelay(fd, active)?;
			}
			Ok(())
		})
	}

	/// Binds to a local address.
	///
	/// The IP may be `SocketAddress::ANY_ADDRESS` (any local interface) and
	/// the port `SocketAddress::ANY_PORT` (kernel-chosen). Binding a port
	/// already bound elsewhere fails with `EADDRINUSE` unless `reuse_port`
	/// was set on this socket (and the others) beforehand.
	pub fn bind(&self, addr: SocketAddress, report: &dyn Report) -> Result<(), SocketError> {
		self.with_open_fd("bind", report, |fd| {
			report.debug(&format!("binding socket to {}", addr));
			let result = addr.with_raw(|ptr, len| unsafe { libc::bind(fd.as_raw_fd(), ptr, len) });
			if result == -1 {
				Err(SocketError::Bind { errno: errno(), addr: addr.to_string() })
			} else {
				Ok(())
			}
		})
	}

	/// Returns the address the socket is actually bound to.
	///
	/// After binding with `ANY_PORT`, the port is the one the kernel chose.
	pub fn local_address(&self, report: &dyn Report) -> Result<SocketAddress, SocketError> {
		self.with_open_fd("local address", report, |fd| {
			let (result, addr) = read_sockaddr::<SocketAddress, _>(|ptr, len| unsafe {
				libc::getsockname(fd.as_raw_fd(), ptr, len)
			});
			if result == -1 {
				return Err(SocketError::GetOption { errno: errno(), option: "local address" });
			}
			addr.ok_or(SocketError::GetOption { errno: libc::EAFNOSUPPORT, option: "local address" })
		})
	}
}

/// Releases the descriptor held in `state`, if any.
///
/// The descriptor is taken out of the state before `close(2)` so it is
/// released exactly once, whatever the kernel answers.
fn close_locked(state: &mut State, handle: &AtomicI32, report: &dyn Report) -> Result<(), SocketError> {
	let Some(owned) = state.fd.take() else {
		return Ok(());
	};
	// Reset before the hooks: if one panics, unwinding drops `owned`.
	handle.store(INVALID_HANDLE, Ordering::Release);
	state.hooks.run_closed(owned.as_fd(), report);
	let raw = owned.into_raw_fd();

	// On Linux the descriptor is gone even when close() fails (EINTR included).
	if unsafe { libc::close(raw) } == -1 {
		let err = SocketError::Close { errno: errno() };
		tracing::debug!(fd = raw, error = %err, "socket closed with error");
		return Err(fail(report, err));
	}
	tracing::debug!(fd = raw, "socket closed");
	Ok(())
}

/// Logs `err` on `report` and hands it back.
pub(crate) fn fail(report: &dyn Report, err: SocketError) -> SocketError {
	report.error(&err.to_string());
	err
}

impl Default for Socket {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for Socket {
	fn drop(&mut self) {
		let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
		let _ = close_locked(state, &self.handle, &NullReport);
	}
}

impl fmt::Debug for Socket {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut d = f.debug_struct("Socket");
		d.field("handle", &self.raw_handle());
		// Never blocks: hooks may format the socket while the lock is held.
		let counts = match self.state.try_lock() {
			Ok(state) => Some(state.hooks.counts()),
			Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().hooks.counts()),
			Err(TryLockError::WouldBlock) => None,
		};
		match counts {
			Some((opened, closed)) => d.field("opened_hooks", &opened).field("closed_hooks", &closed).finish(),
			None => d.finish_non_exhaustive(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::report::NullReport;

	fn open_socket() -> Socket {
		let socket = Socket::new();
		socket.open(&NullReport).unwrap();
		socket
	}

	fn int_option(socket: &Socket, level: libc::c_int, name: libc::c_int) -> libc::c_int {
		socket
			.with_open_fd("read option", &NullReport, |fd| options::get_int_option(fd, level, name, "test"))
			.unwrap()
	}

	#[test]
	fn flags_reach_the_kernel() {
		let socket = open_socket();
		socket.set_keep_alive(true, &NullReport).unwrap();
		socket.set_no_delay(true, &NullReport).unwrap();
		socket.reuse_port(true, &NullReport).unwrap();
		assert_ne!(int_option(&socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE), 0);
		assert_ne!(int_option(&socket, libc::IPPROTO_TCP, libc::TCP_NODELAY), 0);
		assert_ne!(int_option(&socket, libc::SOL_SOCKET, libc::SO_REUSEPORT), 0);

		socket.set_keep_alive(false, &NullReport).unwrap();
		assert_eq!(int_option(&socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE), 0);
	}

	#[test]
	fn ttl_reaches_the_kernel() {
		let socket = open_socket();
		socket.set_ttl(17, &NullReport).unwrap();
		assert_eq!(int_option(&socket, libc::IPPROTO_IP, libc::IP_TTL), 17);
	}

	#[test]
	fn buffer_sizes_are_at_least_requested() {
		// The kernel doubles the requested size.
		let socket = open_socket();
		socket.set_send_buffer_size(16384, &NullReport).unwrap();
		socket.set_receive_buffer_size(16384, &NullReport).unwrap();
		assert!(int_option(&socket, libc::SOL_SOCKET, libc::SO_SNDBUF) >= 16384);
		assert!(int_option(&socket, libc::SOL_SOCKET, libc::SO_RCVBUF) >= 16384);
	}

	#[test]
	fn linger_modes_replace_each_other() {
		let socket = open_socket();
		let linger = |s: &Socket| s.with_open_fd("read linger", &NullReport, options::get_linger).unwrap();

		socket.set_linger_time(5, &NullReport).unwrap();
		assert_eq!(linger(&socket), Linger::Seconds(5));
		socket.set_no_linger(&NullReport).unwrap();
		assert_eq!(linger(&socket), Linger::Disabled);
		socket.set_linger(Linger::Seconds(0), &NullReport).unwrap();
		assert_eq!(linger(&socket), Linger::Seconds(0));
	}

	#[test]
	fn apply_sets_every_configured_option() {
		let socket = open_socket();
		let config = SocketConfig::new()
			.reuse_port(true)
			.ttl(9)
			.linger(Linger::Seconds(2))
			.keep_alive(true)
			.no_delay(true);
		socket.apply(&config, &NullReport).unwrap();
		assert_ne!(int_option(&socket, libc::SOL_SOCKET, libc::SO_REUSEPORT), 0);
		assert_eq!(int_option(&socket, libc::IPPROTO_IP, libc::IP_TTL), 9);
		assert_ne!(int_option(&socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE), 0);
		assert_ne!(int_option(&socket, libc::IPPROTO_TCP, libc::TCP_NODELAY), 0);
		let linger = socket.with_open_fd("read linger", &NullReport, options::get_linger).unwrap();
		assert_eq!(linger, Linger::Seconds(2));
	}

	#[test]
	fn apply_stops_at_first_failure() {
		let socket = open_socket();
		let config = SocketConfig::new().ttl(0).keep_alive(true);
		let err = socket.apply(&config, &NullReport).unwrap_err();
		assert!(matches!(err, SocketError::SetOption { option: "TTL", .. }));
		assert_eq!(int_option(&socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE), 0);
	}

	#[test]
	fn declare_opened_refuses_second_descriptor() {
		let socket = open_socket();
		let before = socket.raw_handle();
		let extra = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
		assert!(extra >= 0);
		let extra = unsafe { OwnedFd::from_raw_fd(extra) };

		let err = socket.declare_opened(extra, &NullReport).unwrap_err();
		assert!(matches!(err, SocketError::AlreadyOpen));
		assert_eq!(socket.raw_handle(), before);
	}

	#[test]
	fn debug_shows_handle_and_hooks() {
		let socket = Socket::new();
		socket.on_closed(|_, _| {});
		let text = format!("{:?}", socket);
		assert!(text.contains("handle: -1"));
		assert!(text.contains("closed_hooks: 1"));
	}
}
