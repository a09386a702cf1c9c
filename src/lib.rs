pub mod socket;
mod addr;
mod error;
mod report;

pub use self::error::{SocketError, errno};
pub use self::addr::SocketAddress;
pub use self::report::{Report, Severity, NullReport, TracingReport, StderrReport};
pub use self::socket::{Socket, SocketPtr, TcpServer, SocketConfig, Linger, Hook, INVALID_HANDLE};
