//! Simulated rendering client
//!
//! Drains a session's outbound queue the way a browser client would: binary
//! batches go through a `DeltaDecompressor`, JSON messages are kept for
//! inspection. When the decoder reports a gap the client issues a
//! `keyframe` control message.

use std::sync::Arc;

use morphcast_codec::{DecodeOutcome, DeltaDecompressor};
use morphcast_core::{AvatarId, MorphFrame, MorphcastResult};
use morphcast_runtime::{ChannelSink, Outbound, SessionOrchestrator};
use morphcast_wire::{ControlAction, ControlData, Envelope, Message};
use tokio::sync::mpsc;

use crate::LossyLink;

/// Counters for one client
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientStats {
    pub batches: u64,
    pub batches_lost: u64,
    pub units_applied: u64,
    pub keyframes_seen: u64,
    pub gaps: u64,
    pub resync_requests: u64,
    pub messages: u64,
}

pub struct SimulatedClient {
    avatar: AvatarId,
    rx: mpsc::Receiver<Outbound>,
    decoder: DeltaDecompressor,
    link: Option<LossyLink>,
    messages: Vec<Envelope>,
    stats: ClientStats,
}

impl SimulatedClient {
    /// Connect a new avatar and attach to its outbound queue
    pub fn connect(
        orchestrator: &SessionOrchestrator,
        avatar: impl Into<AvatarId>,
        capacity: usize,
    ) -> MorphcastResult<Self> {
        let avatar = avatar.into();
        let (sink, rx) = ChannelSink::channel(avatar.clone(), capacity);
        orchestrator.connect(avatar.clone(), Arc::new(sink))?;
        Ok(SimulatedClient {
            avatar,
            rx,
            decoder: DeltaDecompressor::new(),
            link: None,
            messages: Vec::new(),
            stats: ClientStats::default(),
        })
    }

    /// Route binary batches through a lossy link
    pub fn with_link(mut self, link: LossyLink) -> Self {
        self.link = Some(link);
        self
    }

    pub fn avatar(&self) -> &AvatarId {
        &self.avatar
    }

    pub fn decoder(&self) -> &DeltaDecompressor {
        &self.decoder
    }

    /// Latest reconstructed frame
    pub fn current(&self) -> &MorphFrame {
        self.decoder.current()
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn link(&self) -> Option<&LossyLink> {
        self.link.as_ref()
    }

    pub fn messages(&self) -> &[Envelope] {
        &self.messages
    }

    pub fn take_messages(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.messages)
    }

    /// Messages of one kind, in arrival order
    pub fn messages_of(&self, kind: morphcast_wire::MessageType) -> Vec<&Envelope> {
        self.messages
            .iter()
            .filter(|e| e.message_type() == kind)
            .collect()
    }

    /// Drain everything queued so far; returns the applied frames
    pub fn pump(&mut self) -> MorphcastResult<Vec<MorphFrame>> {
        let mut applied = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            match item {
                Outbound::Binary(bytes) => {
                    self.stats.batches += 1;
                    if let Some(link) = self.link.as_mut() {
                        if !link.deliver() {
                            self.stats.batches_lost += 1;
                            continue;
                        }
                    }
                    let units = morphcast_codec::BatchDecoder::decode(&bytes)?;
                    for unit in &units {
                        if unit.is_keyframe() {
                            self.stats.keyframes_seen += 1;
                        }
                        match self.decoder.decompress_frame(unit) {
                            DecodeOutcome::Applied { morphs, .. } => {
                                self.stats.units_applied += 1;
                                applied.push(morphs);
                            }
                            DecodeOutcome::ResyncRequired { .. } => self.stats.gaps += 1,
                        }
                    }
                }
                Outbound::Message(envelope) => {
                    self.stats.messages += 1;
                    self.messages.push(envelope);
                }
            }
        }
        Ok(applied)
    }

    /// Ask for a keyframe if the decoder has lost sync. Returns true if a
    /// request was sent.
    pub fn resync_if_needed(&mut self, orchestrator: &SessionOrchestrator) -> MorphcastResult<bool> {
        if !self.decoder.needs_keyframe() || (self.stats.units_applied == 0 && self.stats.gaps == 0) {
            return Ok(false);
        }
        self.send(orchestrator, Message::Control(ControlData::new(ControlAction::Keyframe)))?;
        self.stats.resync_requests += 1;
        Ok(true)
    }

    /// Send a client message
    pub fn send(&self, orchestrator: &SessionOrchestrator, message: Message) -> MorphcastResult<()> {
        orchestrator.handle_envelope(&self.avatar, Envelope::new(message))
    }

    /// Send raw JSON text
    pub fn send_text(&self, orchestrator: &SessionOrchestrator, text: &str) -> MorphcastResult<()> {
        orchestrator.handle_text(&self.avatar, text)
    }
}
