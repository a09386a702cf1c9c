//! Socket address value type.
//!
//! Sockets in this crate are TCP over IPv4, so there is one address type:
//! `SocketAddress`, an IPv4 host and a port where either part may be the
//! wildcard (`ANY_ADDRESS`, `ANY_PORT`).

mod ipv4;
pub use self::ipv4::SocketAddress;

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub(crate) trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	fn with_raw<F, R>(&self, f: F) -> R
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

/// Trait for address types that can be created from raw sockaddr.
pub(crate) trait FromSockAddr: Sized {
	/// Creates address from raw sockaddr storage.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes.
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self>;
}

/// Reads a socket address through a `getsockname`/`getpeername`/`accept`
/// style call that fills a caller-provided `sockaddr_storage`.
///
/// Returns the syscall result and the decoded address (`None` when the
/// kernel returned something that is not an IPv4 address).
pub(crate) fn read_sockaddr<A, F>(fill: F) -> (libc::c_int, Option<A>)
where
	A: FromSockAddr,
	F: FnOnce(*mut libc::sockaddr, *mut libc::socklen_t) -> libc::c_int,
{
	let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
	let result = fill(&mut storage as *mut _ as *mut libc::sockaddr, &mut len as *mut libc::socklen_t);
	if result < 0 {
		return (result, None);
	}
	let addr = unsafe { A::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) };
	(result, addr)
}
