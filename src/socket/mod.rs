//! TCP socket lifecycle.
//!
//! - `Socket` — owns one descriptor, open/close state machine, options
//! - `TcpServer` — listening variant that opens client sockets on accept
//! - `SocketConfig` — batch of options applied in one call

mod config;
mod hooks;
mod options;
mod server;
mod tcp;

pub use self::config::SocketConfig;
pub use self::hooks::Hook;
pub use self::options::Linger;
pub use self::server::TcpServer;
pub use self::tcp::{Socket, SocketPtr, INVALID_HANDLE};

/*
 ---
  State machine:
  ┌──────────┬──────────────────────────┬──────────┬─────────────────┐
  │  From    │ Operation                │  To      │ Hooks           │
  ├──────────┼──────────────────────────┼──────────┼─────────────────┤
  │ Closed   │ open()                   │ Open     │ opened          │
  ├──────────┼──────────────────────────┼──────────┼─────────────────┤
  │ Closed   │ TcpServer::accept()      │ Open     │ opened          │
  ├──────────┼──────────────────────────┼──────────┼─────────────────┤
  │ Open     │ close() / drop           │ Closed   │ closed          │
  ├──────────┼──────────────────────────┼──────────┼─────────────────┤
  │ Closed   │ close()                  │ Closed   │ none            │
  ├──────────┼──────────────────────────┼──────────┼─────────────────┤
  │ Open     │ open()                   │ Open     │ none, error     │
  └──────────┴──────────────────────────┴──────────┴─────────────────┘
  ---
*/
