//! Worker pool with an explicit lifecycle.
//!
//! Lifecycle:
//! 1. `spawn` binds one socket per device and starts every worker
//! 2. workers run until the token fires or their budget is spent
//! 3. `shutdown` cancels, joins with a deadline, then aborts stragglers

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::worker::{ProbeConfig, ProbeWorker, StopReason};
use crate::error::CoreError;
use crate::registry::DeviceRegistry;
use crate::report::Reporter;

/// Default time granted to workers after cancellation
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// How the pool ended.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Workers that left their loop, with the reason
    pub stopped: Vec<(IpAddr, StopReason)>,
    /// Workers aborted after the deadline
    pub aborted: usize,
}

/// One probe task per registered device.
pub struct ProbePool {
    tasks: JoinSet<(IpAddr, StopReason)>,
    cancel: CancellationToken,
    stopped: Vec<(IpAddr, StopReason)>,
}

impl ProbePool {
    /// Bind a worker for every device in `registry` and start them all.
    ///
    /// Sockets are bound before any task starts, so a bind failure leaves
    /// nothing running.
    pub async fn spawn(
        registry: Arc<DeviceRegistry>,
        reporter: Arc<dyn Reporter>,
        config: ProbeConfig,
        cancel: CancellationToken,
    ) -> Result<Self, CoreError> {
        let mut workers = Vec::with_capacity(registry.len());
        for record in registry.iter() {
            let worker = ProbeWorker::bind(
                record.clone(),
                registry.clone(),
                reporter.clone(),
                config.clone(),
                cancel.clone(),
            )
            .await?;
            workers.push(worker);
        }

        let mut tasks = JoinSet::new();
        for worker in workers {
            let ip = worker.record().ip();
            tasks.spawn(async move { (ip, worker.run().await) });
        }

        info!(workers = tasks.len(), "probe pool started");

        Ok(Self {
            tasks,
            cancel,
            stopped: Vec::new(),
        })
    }

    /// Number of workers still running.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait until every worker stops on its own, then set the stop flag.
    ///
    /// Cancel safe: dropping the future leaves unfinished workers in the pool.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            self.collect(joined);
        }
        self.cancel.cancel();
    }

    /// Cancel every worker and join them, aborting any still running after
    /// `deadline`.
    pub async fn shutdown(mut self, deadline: Duration) -> ShutdownReport {
        self.cancel.cancel();

        let joined = timeout(deadline, async {
            while let Some(joined) = self.tasks.join_next().await {
                self.collect(joined);
            }
        })
        .await;

        let mut aborted = 0;
        if joined.is_err() {
            aborted = self.tasks.len();
            warn!(aborted, "probe workers missed the shutdown deadline, aborting");
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }

        info!(stopped = self.stopped.len(), aborted, "probe pool shut down");

        ShutdownReport {
            stopped: self.stopped,
            aborted,
        }
    }

    fn collect(&mut self, joined: Result<(IpAddr, StopReason), tokio::task::JoinError>) {
        match joined {
            Ok((ip, reason)) => {
                debug!(%ip, ?reason, "probe worker joined");
                self.stopped.push((ip, reason));
            }
            Err(e) => {
                warn!("probe worker failed: {}", e);
            }
        }
    }
}
