//! Transport contract between sessions and connections
//!
//! A session never talks to a socket. It hands `Outbound` items to its
//! `FrameSink`; the connection task drains them in order.

use bytes::Bytes;
use morphcast_core::{AvatarId, MorphcastError, MorphcastResult};
use morphcast_wire::Envelope;
use tokio::sync::mpsc;

/// Anything a session sends to its client
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Encoded animation batch
    Binary(Bytes),
    /// JSON control-plane message
    Message(Envelope),
}

/// Per-session outbound queue. Sends must not block the pipeline.
pub trait FrameSink: Send + Sync {
    fn send(&self, item: Outbound) -> MorphcastResult<()>;
}

/// Bounded channel sink; a full or closed channel is a send failure
#[derive(Debug, Clone)]
pub struct ChannelSink {
    avatar: AvatarId,
    tx: mpsc::Sender<Outbound>,
}

impl ChannelSink {
    pub fn new(avatar: AvatarId, tx: mpsc::Sender<Outbound>) -> Self {
        ChannelSink { avatar, tx }
    }

    /// Sink plus the receiving end for the connection task
    pub fn channel(avatar: AvatarId, capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelSink::new(avatar, tx), rx)
    }
}

impl FrameSink for ChannelSink {
    fn send(&self, item: Outbound) -> MorphcastResult<()> {
        self.tx
            .try_send(item)
            .map_err(|e| MorphcastError::TransportSendFailure {
                avatar: self.avatar.clone(),
                reason: match e {
                    mpsc::error::TrySendError::Full(_) => "outbound queue full".into(),
                    mpsc::error::TrySendError::Closed(_) => "connection closed".into(),
                },
            })
    }
}

/// Sink that drops everything (sessions without a client yet)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn send(&self, _item: Outbound) -> MorphcastResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphcast_wire::Message;

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::channel(AvatarId::new("a1"), 8);
        sink.send(Outbound::Binary(Bytes::from_static(&[1]))).unwrap();
        sink.send(Outbound::Message(Envelope::new(Message::Pong))).unwrap();
        assert_eq!(rx.recv().await, Some(Outbound::Binary(Bytes::from_static(&[1]))));
        assert!(matches!(rx.recv().await, Some(Outbound::Message(_))));
    }

    #[test]
    fn test_full_and_closed_are_failures() {
        let (sink, rx) = ChannelSink::channel(AvatarId::new("a1"), 1);
        sink.send(Outbound::Binary(Bytes::new())).unwrap();
        let err = sink.send(Outbound::Binary(Bytes::new())).unwrap_err();
        assert_eq!(err.code(), "TRANSPORT_ERROR");

        drop(rx);
        let err = sink.send(Outbound::Binary(Bytes::new())).unwrap_err();
        assert!(err.to_string().contains("connection closed"));
    }
}
