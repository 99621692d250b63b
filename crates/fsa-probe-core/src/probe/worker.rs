//! Per-device loss probe loop.
//!
//! Each cycle sends one fixed probe, waits up to the receive timeout for any
//! reply and records the outcome in the device's counters. A timeout is data,
//! never an error: there is no retry of the same probe.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CoreError, ProbeError};
use crate::registry::DeviceRegistry;
use crate::report::{ReportHeading, Reporter};
use crate::types::{DeviceRecord, ProbeStats, ProtocolVersion};

/// Default wait for a probe reply
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// Default send budget per worker
pub const DEFAULT_MAX_PROBES: u64 = 100_000;

/// Default consecutive-loss count that raises a warning
pub const DEFAULT_LOSS_THRESHOLD: u64 = 2;

const RECV_BUFFER_SIZE: usize = 1024;

/// Probe loop parameters
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Wait for each reply
    pub recv_timeout: Duration,
    /// Worker stops once this many probes were sent
    pub max_probes: u64,
    /// Consecutive timeouts that count as sustained loss
    pub loss_threshold: u64,
    /// Destination port for V2 devices
    pub v2_port: u16,
    /// Destination port for V3 devices
    pub v3_port: u16,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            recv_timeout: PROBE_TIMEOUT,
            max_probes: DEFAULT_MAX_PROBES,
            loss_threshold: DEFAULT_LOSS_THRESHOLD,
            v2_port: ProtocolVersion::V2.probe_port(),
            v3_port: ProtocolVersion::V3.probe_port(),
        }
    }
}

impl ProbeConfig {
    pub fn port_for(&self, version: ProtocolVersion) -> u16 {
        match version {
            ProtocolVersion::V2 => self.v2_port,
            ProtocolVersion::V3 => self.v3_port,
        }
    }
}

/// Result of a single probe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A reply arrived in time
    Reply,
    /// No reply in time; `sustained` is set on the cycle that reached the
    /// loss threshold
    Timeout { sustained: bool },
    /// The probe was sent but the budget is now spent
    BudgetExhausted,
}

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    BudgetExhausted,
}

/// Loss probe bound to one device.
pub struct ProbeWorker {
    record: Arc<DeviceRecord>,
    registry: Arc<DeviceRegistry>,
    reporter: Arc<dyn Reporter>,
    socket: UdpSocket,
    target: SocketAddr,
    config: ProbeConfig,
    cancel: CancellationToken,
    buf: Vec<u8>,
}

impl ProbeWorker {
    /// Bind a dedicated socket for `record`.
    pub async fn bind(
        record: Arc<DeviceRecord>,
        registry: Arc<DeviceRegistry>,
        reporter: Arc<dyn Reporter>,
        config: ProbeConfig,
        cancel: CancellationToken,
    ) -> Result<Self, CoreError> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
            .await
            .map_err(|source| ProbeError::Bind {
                ip: record.ip(),
                source,
            })?;
        let target = record.probe_target(config.port_for(record.version()));

        Ok(Self {
            record,
            registry,
            reporter,
            socket,
            target,
            config,
            cancel,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    pub fn record(&self) -> &Arc<DeviceRecord> {
        &self.record
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Run cycles until cancelled or the send budget is spent.
    ///
    /// The token is checked before each send and after each recorded
    /// outcome, never during a receive.
    pub async fn run(mut self) -> StopReason {
        info!(ip = %self.record.ip(), version = %self.record.version(), dest = %self.target, "probe worker started");

        let reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            if self.probe_once().await == ProbeOutcome::BudgetExhausted {
                break StopReason::BudgetExhausted;
            }

            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
        };

        let stats = self.record.stats();
        info!(
            ip = %self.record.ip(),
            ?reason,
            sent = stats.all_cnt,
            lost = stats.timeout_cnt,
            "probe worker stopped"
        );
        reason
    }

    /// One send / await / record cycle.
    pub async fn probe_once(&mut self) -> ProbeOutcome {
        let payload = self.record.version().probe_payload();
        if let Err(e) = self.socket.send_to(payload, self.target).await {
            debug!(dest = %self.target, "probe send failed: {}", e);
        }

        let stats = self.record.update(ProbeStats::record_sent);
        if stats.all_cnt >= self.config.max_probes {
            return ProbeOutcome::BudgetExhausted;
        }

        let recv_result = timeout(self.config.recv_timeout, self.socket.recv_from(&mut self.buf)).await;
        match recv_result {
            Ok(Ok(_)) => {
                self.record.update(ProbeStats::record_reply);
                ProbeOutcome::Reply
            }
            Ok(Err(e)) => {
                debug!(dest = %self.target, "probe receive failed: {}", e);
                self.record_loss()
            }
            Err(_) => self.record_loss(),
        }
    }

    fn record_loss(&self) -> ProbeOutcome {
        let stats = self.record.update(ProbeStats::record_timeout);
        self.reporter
            .report(ReportHeading::LossEvent(self.record.ip()), &self.registry);

        // Fires on reaching the threshold, again only after a reply resets it
        let sustained = stats.continuous_cnt == self.config.loss_threshold.max(1);
        if sustained {
            warn!(
                ip = %self.record.ip(),
                continuous = stats.continuous_cnt,
                "sustained packet loss: {} consecutive probes unanswered",
                stats.continuous_cnt
            );
        }

        ProbeOutcome::Timeout { sustained }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::report::RecordingReporter;
    use crate::types::{V2_PROBE_PAYLOAD, V3_PROBE_PAYLOAD};
    use tokio::task::JoinHandle;

    /// Fake FSA probe endpoint on loopback.
    ///
    /// Probe `n` (0-based) is answered when `script[n]` is true; probes past
    /// the end of the script are answered when `answer_rest` is set. Every
    /// payload must equal `expected`.
    pub(crate) async fn spawn_device(
        script: Vec<bool>,
        answer_rest: bool,
        expected: &'static [u8],
    ) -> (u16, JoinHandle<()>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 64];
            let mut n = 0;
            loop {
                let (len, from) = socket.recv_from(&mut buf).await.unwrap();
                assert_eq!(&buf[..len], expected);
                if script.get(n).copied().unwrap_or(answer_rest) {
                    socket.send_to(b"ack", from).await.unwrap();
                }
                n += 1;
            }
        });

        (port, handle)
    }

    pub(crate) fn test_config(version: ProtocolVersion, port: u16) -> ProbeConfig {
        let mut config = ProbeConfig {
            recv_timeout: Duration::from_millis(100),
            ..ProbeConfig::default()
        };
        match version {
            ProtocolVersion::V2 => config.v2_port = port,
            ProtocolVersion::V3 => config.v3_port = port,
        }
        config
    }

    pub(crate) fn loopback_registry(version: ProtocolVersion) -> Arc<DeviceRegistry> {
        let mut registry = DeviceRegistry::new();
        registry.insert("127.0.0.1".parse().unwrap(), version);
        Arc::new(registry)
    }

    async fn worker_for(
        registry: &Arc<DeviceRegistry>,
        reporter: Arc<dyn Reporter>,
        config: ProbeConfig,
    ) -> ProbeWorker {
        let record = registry.iter().next().unwrap().clone();
        ProbeWorker::bind(record, registry.clone(), reporter, config, CancellationToken::new())
            .await
            .unwrap()
    }

    #[test]
    fn test_default_config_targets_protocol_ports() {
        let config = ProbeConfig::default();
        assert_eq!(config.port_for(ProtocolVersion::V2), 2335);
        assert_eq!(config.port_for(ProtocolVersion::V3), 2340);
        assert_eq!(config.recv_timeout, PROBE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_v2_scattered_loss() {
        let script = vec![true, true, false, true, true, false, true, true, false, true];
        let (port, device) = spawn_device(script, true, &V2_PROBE_PAYLOAD).await;

        let registry = loopback_registry(ProtocolVersion::V2);
        let reporter = Arc::new(RecordingReporter::default());
        let mut worker = worker_for(&registry, reporter.clone(), test_config(ProtocolVersion::V2, port)).await;
        assert_eq!(worker.target().port(), port);

        for _ in 0..10 {
            let outcome = worker.probe_once().await;
            assert_ne!(outcome, ProbeOutcome::Timeout { sustained: true });
        }

        let stats = worker.record().stats();
        assert_eq!(stats.all_cnt, 10);
        assert_eq!(stats.timeout_cnt, 3);
        assert_eq!(stats.continuous_cnt, 0);
        assert!((stats.timeout_rate - 3000.0).abs() < 1e-9);

        let ip = worker.record().ip();
        assert_eq!(reporter.headings(), vec![ReportHeading::LossEvent(ip); 3]);

        device.abort();
    }

    #[tokio::test]
    async fn test_v3_sustained_loss_warns_once_per_streak() {
        // lose 3, answer 1, lose 2
        let script = vec![false, false, false, true, false, false];
        let (port, device) = spawn_device(script, true, &V3_PROBE_PAYLOAD).await;

        let registry = loopback_registry(ProtocolVersion::V3);
        let mut worker = worker_for(
            &registry,
            Arc::new(RecordingReporter::default()),
            test_config(ProtocolVersion::V3, port),
        )
        .await;

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes.push(worker.probe_once().await);
        }

        assert_eq!(
            outcomes,
            vec![
                ProbeOutcome::Timeout { sustained: false },
                ProbeOutcome::Timeout { sustained: true },
                ProbeOutcome::Timeout { sustained: false },
                ProbeOutcome::Reply,
                ProbeOutcome::Timeout { sustained: false },
                ProbeOutcome::Timeout { sustained: true },
            ]
        );

        let stats = worker.record().stats();
        assert_eq!(stats.timeout_cnt, 5);
        assert_eq!(stats.continuous_cnt, 2);

        device.abort();
    }

    #[tokio::test]
    async fn test_budget_stops_worker() {
        let (port, device) = spawn_device(Vec::new(), true, &V2_PROBE_PAYLOAD).await;

        let registry = loopback_registry(ProtocolVersion::V2);
        let config = ProbeConfig {
            max_probes: 3,
            ..test_config(ProtocolVersion::V2, port)
        };
        let worker = worker_for(&registry, Arc::new(RecordingReporter::default()), config).await;
        let record = worker.record().clone();

        assert_eq!(worker.run().await, StopReason::BudgetExhausted);

        let stats = record.stats();
        assert_eq!(stats.all_cnt, 3);
        assert_eq!(stats.timeout_cnt, 0);

        device.abort();
    }

    #[tokio::test]
    async fn test_cancelled_worker_sends_nothing() {
        let (port, device) = spawn_device(Vec::new(), true, &V2_PROBE_PAYLOAD).await;

        let registry = loopback_registry(ProtocolVersion::V2);
        let record = registry.iter().next().unwrap().clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let worker = ProbeWorker::bind(
            record.clone(),
            registry.clone(),
            Arc::new(RecordingReporter::default()),
            test_config(ProtocolVersion::V2, port),
            cancel,
        )
        .await
        .unwrap();

        assert_eq!(worker.run().await, StopReason::Cancelled);
        assert_eq!(record.stats(), ProbeStats::default());

        device.abort();
    }
}
