//! Background metrics broadcaster
//!
//! Every `stats_interval` each session gets a `metrics` message with its own
//! figures plus a process-wide system sample. A failed send skips that
//! session for the tick; the loop keeps going until shutdown.

use std::sync::Arc;

use morphcast_wire::{Envelope, Message};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::{MonitorConfig, Outbound, SessionOrchestrator, SystemSample, SystemSampler};

/// Send one round of metrics. Returns how many sessions were reached.
pub fn broadcast_metrics(orchestrator: &SessionOrchestrator, system: Option<&SystemSample>) -> usize {
    let system_value = system.and_then(|s| serde_json::to_value(s).ok());
    let mut delivered = 0;
    for (avatar, handle) in orchestrator.handles() {
        let session = handle.lock();
        let mut metrics = session.metrics_data();
        if let Some(sample) = system {
            metrics.cpu_usage = Some(sample.process_cpu_percent);
            metrics.memory_mb = Some(sample.process_memory_mb);
        }
        metrics.system = system_value.clone();
        match session.send(Outbound::Message(Envelope::new(Message::Metrics(metrics)))) {
            Ok(()) => delivered += 1,
            Err(e) => warn!(avatar = %avatar, error = %e, "metrics send failed"),
        }
    }
    delivered
}

/// Spawn the broadcaster. It stops when `shutdown` turns true or its sender
/// is dropped.
pub fn spawn_metrics_broadcaster(
    orchestrator: Arc<SessionOrchestrator>,
    config: MonitorConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = SystemSampler::new();
        let mut ticker = time::interval(config.stats_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = sampler.sample();
                    let delivered = broadcast_metrics(&orchestrator, Some(&sample));
                    debug!(delivered, cpu = sample.cpu_percent, "metrics broadcast");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("metrics broadcaster stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelSink, RuntimeConfig};
    use morphcast_core::{AvatarId, ManualClock};
    use std::time::Duration;

    fn orchestrator() -> Arc<SessionOrchestrator> {
        Arc::new(SessionOrchestrator::new(
            RuntimeConfig::default(),
            Arc::new(ManualClock::new(0.0)),
        ))
    }

    #[test]
    fn test_failed_send_skips_session() {
        let orch = orchestrator();
        let (live, mut live_rx) = ChannelSink::channel(AvatarId::new("live"), 8);
        let (dead, dead_rx) = ChannelSink::channel(AvatarId::new("dead"), 8);
        orch.connect(AvatarId::new("live"), Arc::new(live)).unwrap();
        orch.connect(AvatarId::new("dead"), Arc::new(dead)).unwrap();
        drop(dead_rx);
        let _ = live_rx.try_recv();

        let sample = SystemSample {
            cpu_percent: 12.5,
            process_memory_mb: 40.0,
            ..Default::default()
        };
        assert_eq!(broadcast_metrics(&orch, Some(&sample)), 1);
        match live_rx.try_recv() {
            Ok(Outbound::Message(envelope)) => match envelope.message {
                Message::Metrics(metrics) => {
                    assert_eq!(metrics.memory_mb, Some(40.0));
                    assert_eq!(metrics.system.unwrap()["cpu_percent"], 12.5);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broadcaster_ticks_until_shutdown() {
        let orch = orchestrator();
        let avatar = AvatarId::new("a1");
        let (sink, mut rx) = ChannelSink::channel(avatar.clone(), 64);
        orch.connect(avatar, Arc::new(sink)).unwrap();
        let _ = rx.recv().await;

        let config = MonitorConfig {
            stats_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let (tx, shutdown) = watch::channel(false);
        let handle = spawn_metrics_broadcaster(orch, config, shutdown);

        let item = time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        match item {
            Some(Outbound::Message(envelope)) => {
                assert!(matches!(envelope.message, Message::Metrics(_)))
            }
            other => panic!("unexpected {:?}", other),
        }

        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
