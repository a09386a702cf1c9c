use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use crate::addr::{FromSockAddr, ToSockAddr};

/// IPv4 socket address (IP + port).
///
/// Both parts have a wildcard value:
/// - `ANY_ADDRESS` (0.0.0.0) — any local interface
/// - `ANY_PORT` (0) — let the kernel pick an unused port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SocketAddress {
	ip: [u8; 4],
	port: u16,
}

impl SocketAddress {
	/// Wildcard IP address, "any local interface".
	pub const ANY_ADDRESS: [u8; 4] = [0, 0, 0, 0];

	/// Wildcard port, "any unused port".
	pub const ANY_PORT: u16 = 0;

	/// Loopback IP address.
	pub const LOCALHOST: [u8; 4] = [127, 0, 0, 1];

	/// Creates a new IPv4 address.
	pub const fn new(ip: [u8; 4], port: u16) -> Self {
		Self { ip, port }
	}

	/// Any interface, any port.
	pub const fn any() -> Self {
		Self::new(Self::ANY_ADDRESS, Self::ANY_PORT)
	}

	/// Any interface, given port.
	pub const fn any_with_port(port: u16) -> Self {
		Self::new(Self::ANY_ADDRESS, port)
	}

	/// Returns the IP bytes.
	pub fn ip(&self) -> [u8; 4] {
		self.ip
	}

	/// Returns the port.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// True unless the IP part is the wildcard.
	pub fn has_address(&self) -> bool {
		self.ip != Self::ANY_ADDRESS
	}

	/// True unless the port part is the wildcard.
	pub fn has_port(&self) -> bool {
		self.port != Self::ANY_PORT
	}

	/// Replaces the port, keeping the IP.
	pub fn with_port(self, port: u16) -> Self {
		Self { port, ..self }
	}

	/// Creates from raw sockaddr_in.
	pub(crate) fn from_raw(raw: &libc::sockaddr_in) -> Self {
		Self {
			ip: raw.sin_addr.s_addr.to_ne_bytes(),
			port: u16::from_be(raw.sin_port),
		}
	}

	/// Converts to the raw sockaddr_in for syscalls.
	pub(crate) fn to_raw(&self) -> libc::sockaddr_in {
		let mut raw: libc::sockaddr_in = unsafe { std::mem::zeroed() };
		raw.sin_family = libc::AF_INET as libc::sa_family_t;
		raw.sin_port = self.port.to_be();
		raw.sin_addr = libc::in_addr {
			s_addr: u32::from_ne_bytes(self.ip),
		};
		raw
	}
}

impl fmt::Display for SocketAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let [a, b, c, d] = self.ip;
		write!(f, "{}.{}.{}.{}:{}", a, b, c, d, self.port)
	}
}

impl From<SocketAddrV4> for SocketAddress {
	fn from(addr: SocketAddrV4) -> Self {
		Self::new(addr.ip().octets(), addr.port())
	}
}

impl From<SocketAddress> for SocketAddrV4 {
	fn from(addr: SocketAddress) -> Self {
		SocketAddrV4::new(Ipv4Addr::from(addr.ip), addr.port)
	}
}

impl ToSockAddr for SocketAddress {
	fn with_raw<F, R>(&self, f: F) -> R
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw();  // sockaddr_in lives on this stack frame
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
		f(ptr, len)
	}
}

impl FromSockAddr for SocketAddress {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
		if raw.sin_family != libc::AF_INET as libc::sa_family_t {
			return None;
		}
		Some(Self::from_raw(raw))
	}
}
