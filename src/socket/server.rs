use std::ops::Deref;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use crate::addr::{SocketAddress, read_sockaddr};
use crate::error::{SocketError, errno};
use crate::report::Report;
use super::tcp::{Socket, fail};

/// A listening TCP server socket.
///
/// Wraps a `Socket`: open, configure and bind it through `Deref`, then
/// `listen()` and `accept()` clients into their own `Socket`s. This socket
/// does not exchange data.
///
/// # Example
/// ```ignore
/// use tcpsock::{SocketAddress, Socket, TcpServer, TracingReport};
///
/// let report = TracingReport::default();
/// let server = TcpServer::new();
/// server.open(&report)?;
/// server.reuse_port(true, &report)?;
/// server.bind(SocketAddress::any_with_port(8080), &report)?;
/// server.listen(128, &report)?;
///
/// let client = Socket::new();
/// let peer = server.accept(&client, &report)?;
/// ```
#[derive(Debug, Default)]
pub struct TcpServer {
	socket: Socket,
}

impl TcpServer {
	/// Creates a closed server socket.
	pub fn new() -> Self {
		Self { socket: Socket::new() }
	}

	/// Returns the underlying socket.
	pub fn socket(&self) -> &Socket {
		&self.socket
	}

	/// Starts listening for clients.
	///
	/// `backlog` is the maximum number of pending connections.
	pub fn listen(&self, backlog: i32, report: &dyn Report) -> Result<(), SocketError> {
		self.socket.with_open_fd("listen", report, |fd| {
			report.debug(&format!("server listen, backlog is {}", backlog));
			if unsafe { libc::listen(fd.as_raw_fd(), backlog) } == -1 {
				Err(SocketError::Listen { errno: errno(), backlog })
			} else {
				Ok(())
			}
		})
	}

	/// Waits for a client and installs its connection into `client`.
	///
	/// `client` must be closed. On success it is open and its `opened`
	/// hooks have run, exactly as after `Socket::open()`. Returns the
	/// client's address.
	///
	/// Blocks until a client arrives. The server lock is held meanwhile, so
	/// a concurrent `close()` on the server waits for this call to return.
	pub fn accept(&self, client: &Socket, report: &dyn Report) -> Result<SocketAddress, SocketError> {
		if client.is_open() {
			return Err(fail(report, SocketError::AlreadyOpen));
		}

		let (fd, peer) = self.socket.with_open_fd("accept", report, |fd| {
			report.debug("server accepting clients");
			let (result, peer) = read_sockaddr::<SocketAddress, _>(|ptr, len| unsafe {
				libc::accept4(fd.as_raw_fd(), ptr, len, libc::SOCK_CLOEXEC)
			});
			if result == -1 {
				return Err(SocketError::Accept { errno: errno() });
			}
			let accepted = unsafe { OwnedFd::from_raw_fd(result) };
			Ok((accepted, peer.unwrap_or_default()))
		})?;

		report.debug(&format!("received connection from {}", peer));
		client.declare_opened(fd, report)?;
		Ok(peer)
	}
}

impl Deref for TcpServer {
	type Target = Socket;

	fn deref(&self) -> &Socket {
		&self.socket
	}
}
