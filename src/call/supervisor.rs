use tokio::task::JoinHandle;
use tracing::debug;

/// Owns every timer-driven task of one call session.
///
/// At most one task per slot; arming a slot aborts whatever was there.
/// `clear_all` on teardown and terminal entry leaves no timer running.
///
/// One-shot session work (wrap-up, failure records, redial) outlives
/// terminal entry and is only aborted by `abort_background` on teardown.
#[derive(Debug, Default)]
pub struct TimerSupervisor {
    poller: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    speech_restart: Option<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
}

impl TimerSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_poller(&mut self, handle: JoinHandle<()>) {
        Self::replace(&mut self.poller, handle, "poller");
    }

    pub fn arm_ticker(&mut self, handle: JoinHandle<()>) {
        Self::replace(&mut self.ticker, handle, "ticker");
    }

    pub fn arm_speech_restart(&mut self, handle: JoinHandle<()>) {
        Self::replace(&mut self.speech_restart, handle, "speech restart");
    }

    pub fn track_background(&mut self, handle: JoinHandle<()>) {
        self.background.retain(|h| !h.is_finished());
        self.background.push(handle);
    }

    pub fn abort_background(&mut self) {
        for handle in self.background.drain(..) {
            handle.abort();
        }
    }

    /// Background work still running
    pub fn background_count(&self) -> usize {
        self.background.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn stop_poller(&mut self) {
        Self::stop(&mut self.poller, "poller");
    }

    pub fn stop_ticker(&mut self) {
        Self::stop(&mut self.ticker, "ticker");
    }

    pub fn stop_speech_restart(&mut self) {
        Self::stop(&mut self.speech_restart, "speech restart");
    }

    pub fn clear_all(&mut self) {
        self.stop_poller();
        self.stop_ticker();
        self.stop_speech_restart();
    }

    /// Tasks that are armed and have not finished yet
    pub fn live_count(&self) -> usize {
        [&self.poller, &self.ticker, &self.speech_restart]
            .iter()
            .filter(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
            .count()
    }

    fn replace(slot: &mut Option<JoinHandle<()>>, handle: JoinHandle<()>, name: &str) {
        Self::stop(slot, name);
        *slot = Some(handle);
    }

    fn stop(slot: &mut Option<JoinHandle<()>>, name: &str) {
        if let Some(handle) = slot.take() {
            debug!("Stopping {} task", name);
            handle.abort();
        }
    }
}

impl Drop for TimerSupervisor {
    fn drop(&mut self) {
        self.clear_all();
        self.abort_background();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn rearming_aborts_previous_task() {
        let mut supervisor = TimerSupervisor::new();
        let first = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let abort_probe = first.abort_handle();
        supervisor.arm_ticker(first);
        supervisor.arm_ticker(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(abort_probe.is_finished());
        assert_eq!(supervisor.live_count(), 1);
    }

    #[tokio::test]
    async fn clear_all_leaves_nothing_running() {
        let mut supervisor = TimerSupervisor::new();
        for _ in 0..2 {
            supervisor.arm_poller(tokio::spawn(std::future::pending::<()>()));
        }
        supervisor.arm_ticker(tokio::spawn(std::future::pending::<()>()));
        supervisor.arm_speech_restart(tokio::spawn(std::future::pending::<()>()));
        assert_eq!(supervisor.live_count(), 3);

        supervisor.clear_all();
        assert_eq!(supervisor.live_count(), 0);
    }

    #[tokio::test]
    async fn background_work_survives_clear_all_until_aborted() {
        let mut supervisor = TimerSupervisor::new();
        supervisor.arm_ticker(tokio::spawn(std::future::pending::<()>()));
        supervisor.track_background(tokio::spawn(std::future::pending::<()>()));

        supervisor.clear_all();
        assert_eq!(supervisor.live_count(), 0);
        assert_eq!(supervisor.background_count(), 1);

        supervisor.abort_background();
        assert_eq!(supervisor.background_count(), 0);
    }
}
