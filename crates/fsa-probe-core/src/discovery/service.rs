//! One-shot broadcast discovery.
//!
//! Sends a single challenge datagram and records every device that answers
//! before the window closes.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::reply::parse_reply;
use crate::error::{CoreError, DiscoveryError};
use crate::registry::DeviceRegistry;
use crate::report::{ReportHeading, Reporter};

/// Default UDP discovery port
pub const DISCOVERY_PORT: u16 = 2334;

/// Default subnet broadcast address
pub const DEFAULT_BROADCAST: Ipv4Addr = Ipv4Addr::new(192, 168, 137, 255);

/// Challenge string devices answer to
pub const DISCOVERY_MESSAGE: &str = "Is any fourier smart server here?";

/// Default length of the reply window
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

const RECV_BUFFER_SIZE: usize = 1024;

/// Pause after a failed receive before reading again
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Discovery parameters
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Destination of the challenge datagram
    pub broadcast: IpAddr,
    /// Destination port
    pub port: u16,
    /// How long to collect replies
    pub timeout: Duration,
    /// Challenge payload
    pub message: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast: IpAddr::V4(DEFAULT_BROADCAST),
            port: DISCOVERY_PORT,
            timeout: DISCOVERY_TIMEOUT,
            message: DISCOVERY_MESSAGE.to_string(),
        }
    }
}

impl DiscoveryConfig {
    pub fn target(&self) -> SocketAddr {
        SocketAddr::new(self.broadcast, self.port)
    }
}

/// Create an ephemeral UDP socket allowed to send broadcasts.
pub fn create_broadcast_socket() -> Result<std::net::UdpSocket, std::io::Error> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_broadcast(true)?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&addr.into())?;

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Broadcast-and-collect discovery.
pub struct Broadcaster {
    config: DiscoveryConfig,
    cancel: CancellationToken,
}

impl Broadcaster {
    pub fn new(config: DiscoveryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Run discovery into `registry`, then report the search results.
    ///
    /// Stops early when the cancellation token fires. Returns the number of
    /// devices added by this run.
    pub async fn run<R>(&self, registry: &mut DeviceRegistry, reporter: &R) -> Result<usize, CoreError>
    where
        R: Reporter + ?Sized,
    {
        let std_socket = create_broadcast_socket().map_err(DiscoveryError::Socket)?;
        let socket = UdpSocket::from_std(std_socket).map_err(DiscoveryError::Socket)?;

        let result = self.collect(&socket, registry).await;
        drop(socket);

        reporter.report(ReportHeading::SearchResults, registry);
        result
    }

    async fn collect(&self, socket: &UdpSocket, registry: &mut DeviceRegistry) -> Result<usize, CoreError> {
        let dest = self.config.target();
        info!(%dest, timeout_ms = self.config.timeout.as_millis() as u64, "broadcasting discovery request");

        socket
            .send_to(self.config.message.as_bytes(), dest)
            .await
            .map_err(|source| DiscoveryError::Broadcast { addr: dest, source })?;

        let deadline = Instant::now() + self.config.timeout;
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut added = 0;
        let mut recv_errors = 0u32;

        loop {
            let recv_result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("discovery cancelled");
                    break;
                }
                r = timeout_at(deadline, socket.recv_from(&mut buf)) => r,
            };

            match recv_result {
                Ok(Ok((len, addr))) => {
                    let ip = addr.ip();
                    match parse_reply(&buf[..len]) {
                        Ok(version) => {
                            if registry.insert(ip, version) {
                                info!(%ip, %version, "discovered device");
                                added += 1;
                            }
                        }
                        Err(e) => {
                            debug!(
                                %ip,
                                payload = %String::from_utf8_lossy(&buf[..len]),
                                "ignoring discovery reply: {}",
                                e
                            );
                        }
                    }
                }
                Ok(Err(e)) => {
                    // Some stacks report ICMP unreachable on every read until the window closes
                    if recv_errors == 0 {
                        debug!("UDP receive error during discovery: {}", e);
                    }
                    recv_errors += 1;
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                }
                Err(_) => {
                    // Window closed
                    break;
                }
            }
        }

        if recv_errors > 1 {
            debug!(recv_errors, "discovery receive errors repeated");
        }
        info!(added, v2 = registry.v2().len(), v3 = registry.v3().len(), "discovery finished");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;
    use crate::types::ProtocolVersion;

    /// Fake FSA that answers the challenge with each of `replies` in turn.
    async fn spawn_device(replies: Vec<&'static [u8]>) -> (SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 256];
            let (len, from) = socket.recv_from(&mut buf).await.unwrap();
            for reply in replies {
                socket.send_to(reply, from).await.unwrap();
            }
            buf[..len].to_vec()
        });

        (addr, handle)
    }

    fn config_for(addr: SocketAddr, timeout_ms: u64) -> DiscoveryConfig {
        DiscoveryConfig {
            broadcast: addr.ip(),
            port: addr.port(),
            timeout: Duration::from_millis(timeout_ms),
            ..DiscoveryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_replies_yield_one_record() {
        let (addr, device) = spawn_device(vec![
            br#"{"protocol_version": 3}"# as &[u8],
            br#"{"protocol_version": 3, "fw": "1.2"}"#,
            br#"{"protocol_version": 2}"#,
        ])
        .await;

        let reporter = RecordingReporter::default();
        let mut registry = DeviceRegistry::new();
        let broadcaster = Broadcaster::new(config_for(addr, 300), CancellationToken::new());

        let added = broadcaster.run(&mut registry, &reporter).await.unwrap();

        assert_eq!(added, 1);
        assert_eq!(registry.v3().len(), 1);
        assert!(registry.v2().is_empty());
        assert_eq!(registry.v3()[0].ip(), addr.ip());
        assert_eq!(registry.v3()[0].version(), ProtocolVersion::V3);

        let challenge = device.await.unwrap();
        assert_eq!(challenge, DISCOVERY_MESSAGE.as_bytes());
        assert_eq!(reporter.headings(), vec![ReportHeading::SearchResults]);
    }

    #[tokio::test]
    async fn test_malformed_replies_are_skipped() {
        let (addr, _device) = spawn_device(vec![
            b"hello from a stranger" as &[u8],
            &[0xffu8, 0x00, 0xfe],
            br#"{"name": "fsa"}"#,
        ])
        .await;

        let mut registry = DeviceRegistry::new();
        let broadcaster = Broadcaster::new(config_for(addr, 300), CancellationToken::new());
        broadcaster.run(&mut registry, &RecordingReporter::default()).await.unwrap();

        // The valid reply after the garbage is still classified
        assert_eq!(registry.v2().len(), 1);
        assert!(registry.v3().is_empty());
    }

    #[tokio::test]
    async fn test_empty_window_reports_no_devices() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let reporter = RecordingReporter::default();
        let mut registry = DeviceRegistry::new();
        let broadcaster = Broadcaster::new(config_for(addr, 100), CancellationToken::new());

        let added = broadcaster.run(&mut registry, &reporter).await.unwrap();
        assert_eq!(added, 0);
        assert!(registry.is_empty());
        assert_eq!(reporter.headings(), vec![ReportHeading::SearchResults]);
    }

    #[tokio::test]
    async fn test_cancellation_ends_window_early() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let reporter = RecordingReporter::default();
        let mut registry = DeviceRegistry::new();
        let broadcaster = Broadcaster::new(config_for(addr, 10_000), cancel);

        let started = std::time::Instant::now();
        broadcaster.run(&mut registry, &reporter).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(reporter.headings(), vec![ReportHeading::SearchResults]);
    }
}
