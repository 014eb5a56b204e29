//! Idle frame scheduler
//!
//! One shared timer at the target frame rate. Each tick hands every active
//! session either its next queued speech frame or a synthesized idle frame,
//! so avatars keep blinking and emoting when the client goes quiet.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace};

use crate::SessionOrchestrator;

/// Spawn the scheduler. It stops when `shutdown` turns true or its sender
/// is dropped.
pub fn spawn_idle_scheduler(
    orchestrator: Arc<SessionOrchestrator>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = orchestrator.config().frame_interval();
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(period_ms = period.as_secs_f64() * 1000.0, "idle scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let driven = orchestrator.tick_idle();
                    if driven > 0 {
                        trace!(driven, "idle tick");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("idle scheduler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelSink, Outbound, RuntimeConfig};
    use morphcast_core::{AvatarId, SystemClock};
    use morphcast_viseme::PhonemeTiming;
    use std::time::Duration;

    #[tokio::test]
    async fn test_scheduler_drains_queued_speech() {
        let orch = Arc::new(SessionOrchestrator::new(
            RuntimeConfig::default(),
            Arc::new(SystemClock::new()),
        ));
        let avatar = AvatarId::new("a1");
        let (sink, mut rx) = ChannelSink::channel(avatar.clone(), 512);
        orch.connect(avatar.clone(), Arc::new(sink)).unwrap();
        orch.process_phonemes(&avatar, &[PhonemeTiming::new("AA", 0.1)], None)
            .unwrap();

        let (tx, shutdown) = watch::channel(false);
        let handle = spawn_idle_scheduler(orch.clone(), shutdown);

        let got_binary = time::timeout(Duration::from_secs(2), async {
            while let Some(item) = rx.recv().await {
                if matches!(item, Outbound::Binary(_)) {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(got_binary);

        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_scheduler_stops_when_sender_dropped() {
        let orch = Arc::new(SessionOrchestrator::new(
            RuntimeConfig::default(),
            Arc::new(SystemClock::new()),
        ));
        let (tx, shutdown) = watch::channel(false);
        let handle = spawn_idle_scheduler(orch, shutdown);
        drop(tx);
        time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
