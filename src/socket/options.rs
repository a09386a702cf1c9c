use std::os::fd::{AsRawFd, BorrowedFd};
use crate::error::{SocketError, errno};

/// SO_LINGER setting.
///
/// One value covers both modes of the option so that "no linger" and
/// "linger N seconds" can never be set at the same time:
/// - `Disabled` — close returns immediately, the kernel sends pending data
///   in background
/// - `Seconds(0)` — hard reset (RST), unsent data is discarded
/// - `Seconds(n)` — close blocks up to n seconds waiting for data to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linger {
	#[default]
	Disabled,
	Seconds(u32),
}

impl Linger {
	fn to_raw(self) -> Result<libc::linger, SocketError> {
		Ok(match self {
			Linger::Disabled => libc::linger { l_onoff: 0, l_linger: 0 },
			Linger::Seconds(seconds) => libc::linger {
				l_onoff: 1,
				l_linger: to_c_int(seconds as u64, "linger time")?,
			},
		})
	}

	#[cfg(test)]
	fn from_raw(raw: &libc::linger) -> Self {
		if raw.l_onoff == 0 {
			Linger::Disabled
		} else {
			Linger::Seconds(raw.l_linger.max(0) as u32)
		}
	}
}

/// Converts a caller value to the `int` setsockopt expects.
///
/// Out-of-range values fail the same way the kernel rejects bad values.
fn to_c_int(value: u64, option: &'static str) -> Result<libc::c_int, SocketError> {
	libc::c_int::try_from(value).map_err(|_| SocketError::SetOption { errno: libc::EINVAL, option })
}

fn setsockopt<T>(
	socket: BorrowedFd<'_>,
	level: libc::c_int,
	name: libc::c_int,
	value: &T,
	option: &'static str,
) -> Result<(), SocketError> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			value as *const T as *const libc::c_void,
			std::mem::size_of::<T>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option })
	} else {
		Ok(())
	}
}

#[cfg(test)]
fn getsockopt<T: Copy>(
	socket: BorrowedFd<'_>,
	level: libc::c_int,
	name: libc::c_int,
	option: &'static str,
) -> Result<T, SocketError> {
	let mut value: T = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<T>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&mut value as *mut T as *mut libc::c_void,
			&mut len,
		)
	};
	if result == -1 {
		Err(SocketError::GetOption { errno: errno(), option })
	} else {
		Ok(value)
	}
}

fn set_flag(
	socket: BorrowedFd<'_>,
	level: libc::c_int,
	name: libc::c_int,
	enable: bool,
	option: &'static str,
) -> Result<(), SocketError> {
	let val: libc::c_int = if enable { 1 } else { 0 };
	setsockopt(socket, level, name, &val, option)
}

/// Sets send buffer size (SO_SNDBUF).
///
/// The kernel doubles the value internally and clamps it to
/// `net.core.wmem_max`.
pub(crate) fn set_send_buffer_size(socket: BorrowedFd<'_>, size: usize) -> Result<(), SocketError> {
	let val = to_c_int(size as u64, "send buffer size")?;
	setsockopt(socket, libc::SOL_SOCKET, libc::SO_SNDBUF, &val, "send buffer size")
}

/// Sets receive buffer size (SO_RCVBUF).
pub(crate) fn set_recv_buffer_size(socket: BorrowedFd<'_>, size: usize) -> Result<(), SocketError> {
	let val = to_c_int(size as u64, "receive buffer size")?;
	setsockopt(socket, libc::SOL_SOCKET, libc::SO_RCVBUF, &val, "receive buffer size")
}

/// Sets SO_REUSEPORT.
///
/// Allows several sockets to bind the same port. Every one of them must
/// set it before calling bind().
pub(crate) fn set_reuse_port(socket: BorrowedFd<'_>, enable: bool) -> Result<(), SocketError> {
	set_flag(socket, libc::SOL_SOCKET, libc::SO_REUSEPORT, enable, "reuse port")
}

/// Sets the IP time-to-live (IP_TTL). The kernel accepts 1..=255.
pub(crate) fn set_ttl(socket: BorrowedFd<'_>, ttl: u32) -> Result<(), SocketError> {
	let val = to_c_int(ttl as u64, "TTL")?;
	setsockopt(socket, libc::IPPROTO_IP, libc::IP_TTL, &val, "TTL")
}

/// Sets SO_LINGER.
pub(crate) fn set_linger(socket: BorrowedFd<'_>, linger: Linger) -> Result<(), SocketError> {
	let val = linger.to_raw()?;
	setsockopt(socket, libc::SOL_SOCKET, libc::SO_LINGER, &val, "linger time")
}

/// Enables TCP keep-alive probes on idle connections (SO_KEEPALIVE).
pub(crate) fn set_keepalive(socket: BorrowedFd<'_>, enable: bool) -> Result<(), SocketError> {
	set_flag(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, enable, "keep alive")
}

/// Sets TCP_NODELAY (disables Nagle's algorithm).
pub(crate) fn set_nodelay(socket: BorrowedFd<'_>, enable: bool) -> Result<(), SocketError> {
	set_flag(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, enable, "no delay")
}

// Readers below check what the kernel actually holds.

#[cfg(test)]
pub(crate) fn get_int_option(
	socket: BorrowedFd<'_>,
	level: libc::c_int,
	name: libc::c_int,
	option: &'static str,
) -> Result<libc::c_int, SocketError> {
	getsockopt::<libc::c_int>(socket, level, name, option)
}

#[cfg(test)]
pub(crate) fn get_linger(socket: BorrowedFd<'_>) -> Result<Linger, SocketError> {
	getsockopt::<libc::linger>(socket, libc::SOL_SOCKET, libc::SO_LINGER, "linger time")
		.map(|raw| Linger::from_raw(&raw))
}
