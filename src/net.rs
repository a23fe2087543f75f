use std::sync::atomic::{AtomicBool, Ordering};

/// A network request as enqueued by a network action (spec.md §4.6/§6):
/// either an HTTP call or a raw TCP/UDP read, with the `content` body
/// already template-rendered by [`crate::action::template`].
#[derive(Debug, Clone)]
pub enum NetworkRequest {
	Http { method: String, url: String, body: String },
	RawTcp { host: String, port: u16, body: Vec<u8> },
	RawUdp { host: String, port: u16, body: Vec<u8> },
}

/// Boundary trait over the network worker (spec.md §7 "Network error":
/// connect/send/receive failures are logged and the worker exits releasing
/// the mutex, with no retry at this layer).
pub trait NetworkClient {
	fn execute(&mut self, request: &NetworkRequest) -> Result<Vec<u8>, String>;
}

/// Blocking `reqwest`-backed client for HTTP requests; raw TCP/UDP use
/// `std::net` directly. Neither variant parses its response itself —
/// the bytes come back to the dispatching service's worker task, which
/// runs them through `Runtime::apply_free_monitor_response` (spec.md
/// §4.6 pattern/offset/width extraction) if that service is a free
/// monitor configured with a `Network` source.
pub struct ReqwestNetworkClient {
	agent: reqwest::blocking::Client,
}

impl ReqwestNetworkClient {
	pub fn new() -> Self {
		ReqwestNetworkClient { agent: reqwest::blocking::Client::new() }
	}
}

impl Default for ReqwestNetworkClient {
	fn default() -> Self {
		Self::new()
	}
}

impl NetworkClient for ReqwestNetworkClient {
	fn execute(&mut self, request: &NetworkRequest) -> Result<Vec<u8>, String> {
		match request {
			NetworkRequest::Http { method, url, body } => {
				let method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|e| e.to_string())?;
				let response = self
					.agent
					.request(method, url)
					.body(body.clone())
					.send()
					.map_err(|e| e.to_string())?;
				response.bytes().map(|b| b.to_vec()).map_err(|e| e.to_string())
			}
			NetworkRequest::RawTcp { host, port, body } => {
				use std::io::{Read, Write};
				use std::net::TcpStream;
				let mut stream = TcpStream::connect((host.as_str(), *port)).map_err(|e| e.to_string())?;
				stream.write_all(body).map_err(|e| e.to_string())?;
				let mut buf = Vec::new();
				stream.read_to_end(&mut buf).map_err(|e| e.to_string())?;
				Ok(buf)
			}
			NetworkRequest::RawUdp { host, port, body } => {
				use std::net::UdpSocket;
				let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| e.to_string())?;
				socket.connect((host.as_str(), *port)).map_err(|e| e.to_string())?;
				socket.send(body).map_err(|e| e.to_string())?;
				let mut buf = [0u8; 2048];
				let n = socket.recv(&mut buf).map_err(|e| e.to_string())?;
				Ok(buf[..n].to_vec())
			}
		}
	}
}

/// Test double recording requests and replaying canned responses in order.
#[derive(Default)]
pub struct MockNetworkClient {
	pub sent: Vec<NetworkRequest>,
	pub responses: Vec<Result<Vec<u8>, String>>,
}

impl NetworkClient for MockNetworkClient {
	fn execute(&mut self, request: &NetworkRequest) -> Result<Vec<u8>, String> {
		self.sent.push(request.clone());
		if self.responses.is_empty() {
			Ok(Vec::new())
		} else {
			self.responses.remove(0)
		}
	}
}

/// Serializes concurrent network workers to one in flight at a time
/// (spec.md §5 "network mutex"; spec.md §7 releases it on worker exit).
#[derive(Default)]
pub struct NetworkMutex {
	busy: AtomicBool,
}

impl NetworkMutex {
	pub fn new() -> Self {
		NetworkMutex::default()
	}

	/// Attempts to acquire the mutex; returns a guard that releases on drop.
	pub fn try_acquire(&self) -> Option<NetworkMutexGuard<'_>> {
		if self.busy.swap(true, Ordering::AcqRel) {
			None
		} else {
			Some(NetworkMutexGuard { mutex: self })
		}
	}
}

pub struct NetworkMutexGuard<'a> {
	mutex: &'a NetworkMutex,
}

impl Drop for NetworkMutexGuard<'_> {
	fn drop(&mut self) {
		self.mutex.busy.store(false, Ordering::Release);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mutex_rejects_second_acquire_until_guard_drops() {
		let mutex = NetworkMutex::new();
		let guard = mutex.try_acquire();
		assert!(guard.is_some());
		assert!(mutex.try_acquire().is_none());
		drop(guard);
		assert!(mutex.try_acquire().is_some());
	}

	#[test]
	fn mock_client_replays_canned_responses_in_order() {
		let mut client = MockNetworkClient { sent: Vec::new(), responses: vec![Ok(b"one".to_vec()), Ok(b"two".to_vec())] };
		let req = NetworkRequest::Http { method: "GET".into(), url: "http://example".into(), body: String::new() };
		assert_eq!(client.execute(&req).unwrap(), b"one".to_vec());
		assert_eq!(client.execute(&req).unwrap(), b"two".to_vec());
		assert_eq!(client.sent.len(), 2);
	}
}
