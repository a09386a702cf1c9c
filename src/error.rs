/// Socket lifecycle and configuration errors.
///
/// Every variant except the two state errors carries the `errno` reported
/// by the failing system call.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket is already open")]
    AlreadyOpen,

    #[error("{operation}: socket is not open")]
    NotOpen { operation: &'static str },

    #[error("error creating socket: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error("error closing socket: {}", errno_to_str(*.errno))]
    Close { errno: i32 },

    #[error("error binding socket to local address {addr}: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("error starting TCP server (listen, backlog={backlog}): {}", errno_to_str(*.errno))]
    Listen { errno: i32, backlog: i32 },

    #[error("error accepting TCP client: {}", errno_to_str(*.errno))]
    Accept { errno: i32 },

    #[error("error setting socket {option}: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("error getting socket {option}: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },
}

impl SocketError {
    /// Returns the OS error code behind this error.
    ///
    /// State errors map to the code the kernel would have produced:
    /// `EISCONN` for an open socket, `EBADF` for a closed one.
    pub fn errno(&self) -> i32 {
        match self {
            SocketError::AlreadyOpen => libc::EISCONN,
            SocketError::NotOpen { .. } => libc::EBADF,
            SocketError::Create { errno }
            | SocketError::Close { errno }
            | SocketError::Bind { errno, .. }
            | SocketError::Listen { errno, .. }
            | SocketError::Accept { errno }
            | SocketError::SetOption { errno, .. }
            | SocketError::GetOption { errno, .. } => *errno,
        }
    }

    /// Returns the matching `std::io::ErrorKind`.
    pub fn kind(&self) -> std::io::ErrorKind {
        match self {
            SocketError::AlreadyOpen => std::io::ErrorKind::AlreadyExists,
            SocketError::NotOpen { .. } => std::io::ErrorKind::NotConnected,
            other => errno_to_kind(other.errno()),
        }
    }

    /// True when the kernel ran out of descriptors or buffer memory.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(
            self.errno(),
            libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM
        ) && matches!(self, SocketError::Create { .. } | SocketError::Accept { .. })
    }
}

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Converts errno to a human-readable string, always carrying the code.
fn errno_to_str(errno: i32) -> String {
    let text = match errno {
        libc::EACCES => "permission denied",
        libc::EADDRINUSE => "address already in use",
        libc::EADDRNOTAVAIL => "address not available",
        libc::EAFNOSUPPORT => "address family not supported",
        libc::EAGAIN => "resource temporarily unavailable",
        libc::EBADF => "bad file descriptor",
        libc::ECONNABORTED => "connection aborted",
        libc::EINTR => "interrupted by signal",
        libc::EINVAL => "invalid argument",
        libc::EIO => "input/output error",
        libc::EISCONN => "already connected",
        libc::EMFILE => "too many open files",
        libc::ENFILE => "too many open files in system",
        libc::ENOBUFS => "no buffer space available",
        libc::ENOMEM => "out of memory",
        libc::ENOPROTOOPT => "protocol not available",
        libc::ENOTSOCK => "not a socket",
        libc::EOPNOTSUPP => "operation not supported",
        libc::EPERM => "operation not permitted",
        _ => return format!("errno {}", errno),
    };
    format!("{} (errno {})", text, errno)
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNABORTED => std::io::ErrorKind::ConnectionAborted,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOMEM => std::io::ErrorKind::OutOfMemory,
        libc::EOPNOTSUPP => std::io::ErrorKind::Unsupported,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        std::io::Error::new(err.kind(), err)
    }
}
