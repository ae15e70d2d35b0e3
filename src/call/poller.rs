use super::status::{normalize_status, CallStatus};
use crate::backend::CallBackend;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Polling speed: fast while waiting to connect, slow once connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollCadence {
    Fast,
    Slow,
}

#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    pub fast: Duration,
    pub slow: Duration,
}

impl PollIntervals {
    pub fn period(&self, cadence: PollCadence) -> Duration {
        match cadence {
            PollCadence::Fast => self.fast,
            PollCadence::Slow => self.slow,
        }
    }
}

/// Drops poll results that would not move the call.
///
/// Only `connected`, `ended` and `error` are forwarded, and each at most
/// once in a row.
#[derive(Debug, Default)]
pub struct PollFilter {
    last_forwarded: Option<CallStatus>,
}

impl PollFilter {
    /// Start from the status the state machine is already in
    pub fn seeded(current: CallStatus) -> Self {
        Self {
            last_forwarded: Some(current),
        }
    }

    pub fn observe(&mut self, status: Option<CallStatus>) -> Option<CallStatus> {
        let status = status?;
        if matches!(status, CallStatus::Initiating | CallStatus::Ringing) {
            return None;
        }
        if self.last_forwarded == Some(status) {
            return None;
        }
        self.last_forwarded = Some(status);
        Some(status)
    }
}

/// Receiver of meaningful poll results
#[async_trait]
pub trait PollTarget: Send + Sync {
    async fn deliver(&self, status: CallStatus, transcript: Option<String>);
}

/// Periodically queries a backend for one call's status
pub struct Poller {
    backend: Arc<dyn CallBackend>,
    call_id: String,
    cadence: PollCadence,
    period: Duration,
    request_timeout: Duration,
    status_rx: watch::Receiver<CallStatus>,
}

impl Poller {
    pub fn new(
        backend: Arc<dyn CallBackend>,
        call_id: String,
        cadence: PollCadence,
        period: Duration,
        request_timeout: Duration,
        status_rx: watch::Receiver<CallStatus>,
    ) -> Self {
        Self {
            backend,
            call_id,
            cadence,
            period,
            request_timeout,
            status_rx,
        }
    }

    fn settled(&self) -> bool {
        self.status_rx.borrow().is_terminal()
    }

    /// Poll until the call settles or the target goes away.
    ///
    /// Transport failures and timeouts are logged and the loop carries on.
    pub async fn run<T>(self, target: Weak<T>)
    where
        T: PollTarget + ?Sized,
    {
        let current = *self.status_rx.borrow();
        let mut filter = PollFilter::seeded(current);
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Polling call {} ({:?}, every {:?})",
            self.call_id, self.cadence, self.period
        );

        loop {
            ticker.tick().await;
            if self.settled() {
                break;
            }

            let report = match timeout(self.request_timeout, self.backend.get_status(&self.call_id))
                .await
            {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => {
                    warn!("Status check for {} failed: {}", self.call_id, e);
                    continue;
                }
                Err(_) => {
                    warn!(
                        "Status check for {} timed out after {:?}",
                        self.call_id, self.request_timeout
                    );
                    continue;
                }
            };

            // The call may have settled while the request was in flight
            if self.settled() {
                break;
            }

            let Some(status) = filter.observe(normalize_status(&report.status)) else {
                debug!("Call {} still {}", self.call_id, report.status);
                continue;
            };

            let Some(target) = target.upgrade() else {
                break;
            };
            target.deliver(status, report.transcript).await;

            if status.is_terminal() {
                break;
            }
        }

        debug!("Poller for {} ({:?}) stopped", self.call_id, self.cadence);
    }
}
