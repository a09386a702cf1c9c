use super::options::Linger;

/// Socket options to apply in one go with `Socket::apply`.
///
/// Unset fields are left at the kernel default.
///
/// # Example
/// ```ignore
/// use tcpsock::{Linger, Socket, SocketConfig, TracingReport};
///
/// let report = TracingReport::default();
/// let socket = Socket::new();
/// socket.open(&report)?;
/// socket.apply(&SocketConfig::new()
///     .reuse_port(true)
///     .no_delay(true)
///     .linger(Linger::Seconds(5))
///     .buffers(65536), &report)?;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketConfig {
	pub reuse_port: Option<bool>,
	pub send_buffer_size: Option<usize>,
	pub receive_buffer_size: Option<usize>,
	pub ttl: Option<u32>,
	pub linger: Option<Linger>,
	pub keep_alive: Option<bool>,
	pub no_delay: Option<bool>,
}

impl SocketConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reuse_port(mut self, enable: bool) -> Self {
		self.reuse_port = Some(enable);
		self
	}

	pub fn send_buffer_size(mut self, size: usize) -> Self {
		self.send_buffer_size = Some(size);
		self
	}

	pub fn receive_buffer_size(mut self, size: usize) -> Self {
		self.receive_buffer_size = Some(size);
		self
	}

	/// Same size for both directions.
	pub fn buffers(mut self, size: usize) -> Self {
		self.send_buffer_size = Some(size);
		self.receive_buffer_size = Some(size);
		self
	}

	pub fn ttl(mut self, ttl: u32) -> Self {
		self.ttl = Some(ttl);
		self
	}

	pub fn linger(mut self, linger: Linger) -> Self {
		self.linger = Some(linger);
		self
	}

	pub fn keep_alive(mut self, enable: bool) -> Self {
		self.keep_alive = Some(enable);
		self
	}

	pub fn no_delay(mut self, enable: bool) -> Self {
		self.no_delay = Some(enable);
		self
	}

	/// True when no option is set.
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_sets_fields() {
		let config = SocketConfig::new()
			.reuse_port(true)
			.buffers(4096)
			.ttl(32)
			.linger(Linger::Seconds(3))
			.keep_alive(false)
			.no_delay(true);
		assert_eq!(config.reuse_port, Some(true));
		assert_eq!(config.send_buffer_size, Some(4096));
		assert_eq!(config.receive_buffer_size, Some(4096));
		assert_eq!(config.ttl, Some(32));
		assert_eq!(config.linger, Some(Linger::Seconds(3)));
		assert_eq!(config.keep_alive, Some(false));
		assert_eq!(config.no_delay, Some(true));
		assert!(!config.is_empty());
	}

	#[test]
	fn last_linger_wins() {
		let config = SocketConfig::new().linger(Linger::Seconds(10)).linger(Linger::Disabled);
		assert_eq!(config.linger, Some(Linger::Disabled));
		assert!(SocketConfig::default().is_empty());
	}
}
