//! Session orchestrator
//!
//! Owns the avatar registry and routes every inbound message to the right
//! session. Each session's pipeline runs under its own mutex, so frames for
//! one avatar are strictly serialized while different avatars proceed in
//! parallel. The registry lock is never held while a session is locked,
//! except to snapshot handles.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use morphcast_core::{AvatarId, Clock, MorphFrame, MorphcastError, MorphcastResult};
use morphcast_viseme::{
    EngineConfig, Emotion, MicroExpression, PhonemeMapper, PhonemeTiming, StressLevel,
    VisemeTransitionEngine,
};
use morphcast_wire::{
    AckData, AnimationData, AudioData, ControlAction, ControlData, Envelope, Message, MetricsData,
    VisemeCue, VisemeData,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    AvatarSession, Capabilities, EnergyPhonemeSource, FrameOutcome, FrameSink, Outbound,
    PhonemeSource, RuntimeConfig, SessionState,
};

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<AvatarSession>>;

/// Non-owning handle; dies with the session
pub type WeakSessionHandle = Weak<Mutex<AvatarSession>>;

/// Snapshot for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub metrics: MetricsData,
    pub capabilities: Capabilities,
    pub active_sessions: usize,
}

/// Per-avatar session registry and message router
pub struct SessionOrchestrator {
    config: RuntimeConfig,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<AvatarId, SessionHandle>>,
    engine: VisemeTransitionEngine,
    mapper: PhonemeMapper,
    phoneme_source: Box<dyn PhonemeSource>,
}

impl SessionOrchestrator {
    pub fn new(config: RuntimeConfig, clock: Arc<dyn Clock>) -> Self {
        let engine = VisemeTransitionEngine::new(EngineConfig::with_fps(config.target_fps));
        SessionOrchestrator {
            config,
            clock,
            sessions: RwLock::new(HashMap::new()),
            engine,
            mapper: PhonemeMapper::new(),
            phoneme_source: Box::new(EnergyPhonemeSource::default()),
        }
    }

    /// Replace the audio to phoneme stage
    pub fn with_phoneme_source(mut self, source: Box<dyn PhonemeSource>) -> Self {
        self.phoneme_source = source;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn contains(&self, avatar: &AvatarId) -> bool {
        self.sessions.read().contains_key(avatar)
    }

    pub fn session(&self, avatar: &AvatarId) -> MorphcastResult<SessionHandle> {
        self.sessions
            .read()
            .get(avatar)
            .cloned()
            .ok_or_else(|| MorphcastError::UnknownAvatar(avatar.clone()))
    }

    /// Snapshot of every registered session
    pub fn handles(&self) -> Vec<(AvatarId, SessionHandle)> {
        self.sessions
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect()
    }

    /// Is `handle` still the registered session for `avatar`?
    pub fn owns(&self, avatar: &AvatarId, handle: &SessionHandle) -> bool {
        self.sessions
            .read()
            .get(avatar)
            .map_or(false, |current| Arc::ptr_eq(current, handle))
    }

    /// Register an avatar. A second connect for the same id replaces the
    /// old session. The returned handle identifies this connection's
    /// session for `owns` and `release`.
    pub fn connect(&self, avatar: AvatarId, sink: Arc<dyn FrameSink>) -> MorphcastResult<SessionHandle> {
        let session = AvatarSession::new(avatar.clone(), &self.config, sink, self.clock.now());
        if let Err(e) = session.send(Outbound::Message(session.state_message())) {
            warn!(avatar = %avatar, error = %e, "failed to send initial state");
        }

        let handle = Arc::new(Mutex::new(session));
        let previous = {
            let mut sessions = self.sessions.write();
            if sessions.len() >= self.config.max_sessions && !sessions.contains_key(&avatar) {
                return Err(MorphcastError::CapacityExceeded(self.config.max_sessions));
            }
            sessions.insert(avatar.clone(), Arc::clone(&handle))
        };
        if let Some(previous) = previous {
            warn!(avatar = %avatar, "replacing existing session");
            Self::close(&previous);
        }
        info!(avatar = %avatar, sessions = self.session_count(), "avatar connected");
        Ok(handle)
    }

    /// Drop a session, flushing its partial batch best-effort
    pub fn disconnect(&self, avatar: &AvatarId) -> bool {
        let removed = self.sessions.write().remove(avatar);
        match removed {
            Some(handle) => {
                Self::close(&handle);
                info!(avatar = %avatar, sessions = self.session_count(), "avatar disconnected");
                true
            }
            None => false,
        }
    }

    /// Disconnect `avatar` only while `handle` is still its session. A
    /// connection that was replaced leaves the new session alone.
    pub fn release(&self, avatar: &AvatarId, handle: &SessionHandle) -> bool {
        let removed = {
            let mut sessions = self.sessions.write();
            match sessions.get(avatar) {
                Some(current) if Arc::ptr_eq(current, handle) => sessions.remove(avatar),
                _ => None,
            }
        };
        match removed {
            Some(handle) => {
                Self::close(&handle);
                info!(avatar = %avatar, sessions = self.session_count(), "avatar disconnected");
                true
            }
            None => false,
        }
    }

    fn close(handle: &SessionHandle) {
        let mut session = handle.lock();
        match session.flush() {
            Ok(Some(pending)) => {
                if let Err(e) = session.send(Outbound::Binary(pending)) {
                    debug!(avatar = %session.id(), error = %e, "final flush not delivered");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(avatar = %session.id(), error = %e, "final flush failed"),
        }
        session.set_state(SessionState::Disconnected);
    }

    /// Apply the result of a pipeline run to the session's error budget.
    /// Returns true when the session must be dropped.
    fn account<T>(session: &mut AvatarSession, result: &MorphcastResult<T>) -> bool {
        match result {
            Ok(_) => {
                session.budget_mut().record_success();
                false
            }
            Err(e) if e.is_internal() => session.budget_mut().record_failure(),
            Err(_) => false,
        }
    }

    fn drop_exhausted(&self, avatar: &AvatarId) {
        warn!(avatar = %avatar, budget = self.config.retry_budget, "error budget exhausted");
        self.disconnect(avatar);
    }

    /// Run one client frame through the session pipeline
    pub fn process_frame(&self, avatar: &AvatarId, raw: &MorphFrame) -> MorphcastResult<FrameOutcome> {
        let handle = self.session(avatar)?;
        let now = self.clock.now();
        let (result, exhausted) = {
            let mut session = handle.lock();
            session.touch_input(now);
            let result = session.process(raw, now, &self.config);
            let exhausted = Self::account(&mut session, &result);
            (result, exhausted)
        };
        if exhausted {
            self.drop_exhausted(avatar);
        }
        result
    }

    /// `animation` payload entry point
    pub fn process_animation(&self, avatar: &AvatarId, data: &AnimationData) -> MorphcastResult<FrameOutcome> {
        data.validate()?;
        if let Some(names) = &data.priority_morphs {
            self.session(avatar)?
                .lock()
                .add_priority_morphs(names.iter().map(String::as_str));
        }
        let raw: MorphFrame = data
            .blendshapes
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        self.process_frame(avatar, &raw)
    }

    /// Run a phoneme sequence through the transition engine and queue the
    /// frames for the idle scheduler. Returns the number queued.
    pub fn process_phonemes(
        &self,
        avatar: &AvatarId,
        sequence: &[PhonemeTiming],
        stress: Option<&[StressLevel]>,
    ) -> MorphcastResult<usize> {
        let handle = self.session(avatar)?;
        let frames = self.engine.process_phonemes(&self.mapper, sequence, stress);
        let mut session = handle.lock();
        if !session.state().accepts_frames() {
            return Err(MorphcastError::NotActive(avatar.clone()));
        }
        session.set_state(SessionState::Active);
        let produced = frames.len();
        let queued = session.enqueue(frames, self.config.max_queued_frames);
        if queued < produced {
            warn!(avatar = %avatar, produced, queued, "speech queue full");
        }
        debug!(avatar = %avatar, phonemes = sequence.len(), queued, "queued speech frames");
        Ok(queued)
    }

    /// Decode an audio chunk, derive phonemes and queue the speech frames
    pub fn process_audio(&self, avatar: &AvatarId, audio: &AudioData) -> MorphcastResult<VisemeData> {
        self.session(avatar)?;
        let samples = audio.decode_samples()?;
        let timings = self.phoneme_source.phonemes(&samples, audio.sample_rate);
        self.process_phonemes(avatar, &timings, None)?;

        let cues = timings
            .iter()
            .map(|timing| VisemeCue {
                viseme: self.mapper.viseme_for(&timing.phoneme).to_string(),
                weight: timing.intensity,
                duration: (timing.duration * 1000.0).round() as u64,
                phoneme: Some(timing.phoneme.clone()),
            })
            .collect();
        Ok(VisemeData::new(cues))
    }

    /// Apply a control command
    pub fn handle_control(&self, avatar: &AvatarId, control: &ControlData) -> MorphcastResult<()> {
        let handle = self.session(avatar)?;
        let now = self.clock.now();
        let mut session = handle.lock();
        match control.action {
            ControlAction::Start | ControlAction::Resume => {
                if let Some(Value::String(name)) = control.param("emotion") {
                    let emotion: Emotion = name.parse()?;
                    let intensity = control.param("intensity").and_then(Value::as_f64).unwrap_or(1.0);
                    session.expression_mut().set_emotion(emotion, intensity);
                }
                session.set_state(SessionState::Active);
                session.rearm();
            }
            ControlAction::Stop => {
                if let Some(pending) = session.flush()? {
                    session.send(Outbound::Binary(pending))?;
                }
                session.set_state(SessionState::Paused);
            }
            ControlAction::Pause => session.set_state(SessionState::Paused),
            ControlAction::Reset => session.reset()?,
            ControlAction::Keyframe => session.force_keyframe(),
            ControlAction::Quality => {
                let level = control.quality_level()?;
                if let Some(pending) = session.flush()? {
                    session.send(Outbound::Binary(pending))?;
                }
                session.set_quality(level);
                session.send(Outbound::Message(session.state_message()))?;
            }
        }
        if let Some(Value::String(name)) = control.param("micro_expression") {
            let kind: MicroExpression = serde_json::from_value(Value::String(name.clone()))
                .map_err(|_| MorphcastError::InvalidMessage(format!("unknown micro expression: {}", name)))?;
            session.expression_mut().trigger(kind, now);
        }
        info!(
            avatar = %avatar,
            action = control.action.as_str(),
            state = %session.state(),
            quality = session.quality().as_str(),
            "control applied"
        );
        Ok(())
    }

    /// Set the emotion the expression layer blends into every frame
    pub fn set_emotion(&self, avatar: &AvatarId, emotion: Emotion, intensity: f64) -> MorphcastResult<()> {
        let handle = self.session(avatar)?;
        handle.lock().expression_mut().set_emotion(emotion, intensity);
        Ok(())
    }

    /// One idle scheduler tick: drive every active session that has queued
    /// speech or has gone quiet. Returns how many frames were produced.
    pub fn tick_idle(&self) -> usize {
        let now = self.clock.now();
        let mut driven = 0;
        let mut exhausted = Vec::new();
        for (avatar, handle) in self.handles() {
            let mut session = handle.lock();
            if !session.wants_idle_tick(now, self.config.idle_after) {
                continue;
            }
            let frame = session.next_idle_frame(now);
            let mut result = session.process(&frame, now, &self.config);
            let payload = result.as_ref().ok().and_then(|outcome| outcome.payload().cloned());
            if let Some(payload) = payload {
                if let Err(e) = session.send(Outbound::Binary(payload)) {
                    result = Err(e);
                }
            }
            if Self::account(&mut session, &result) {
                exhausted.push(avatar);
                continue;
            }
            match result {
                Ok(outcome) if !outcome.is_skipped() => driven += 1,
                Ok(_) => {}
                Err(e) => debug!(avatar = %avatar, error = %e, "idle frame failed"),
            }
        }
        for avatar in exhausted {
            self.drop_exhausted(&avatar);
        }
        driven
    }

    fn send_to(&self, avatar: &AvatarId, item: Outbound) -> MorphcastResult<()> {
        self.session(avatar)?.lock().send(item)
    }

    /// Report an error to the client; failures are only logged
    pub fn report_error(&self, avatar: &AvatarId, err: &MorphcastError) {
        if let Err(e) = self.send_to(avatar, Outbound::Message(Envelope::error(err))) {
            debug!(avatar = %avatar, error = %e, "error report not delivered");
        }
    }

    /// Parse and dispatch a JSON text message
    pub fn handle_text(&self, avatar: &AvatarId, text: &str) -> MorphcastResult<()> {
        match Envelope::parse(text) {
            Ok(envelope) => self.handle_envelope(avatar, envelope),
            Err(e) => {
                let err = MorphcastError::from(e);
                self.report_error(avatar, &err);
                Err(err)
            }
        }
    }

    /// Dispatch one client message. Replies go out through the session's
    /// sink; errors are reported to the client and returned.
    pub fn handle_envelope(&self, avatar: &AvatarId, envelope: Envelope) -> MorphcastResult<()> {
        let result = self.dispatch(avatar, envelope);
        if let Err(e) = &result {
            if e.is_internal() {
                warn!(avatar = %avatar, error = %e, "pipeline error");
            } else {
                debug!(avatar = %avatar, error = %e, "rejected message");
            }
            self.report_error(avatar, e);
        }
        result
    }

    fn dispatch(&self, avatar: &AvatarId, envelope: Envelope) -> MorphcastResult<()> {
        let Envelope { id, message, .. } = envelope;
        match message {
            Message::Animation(data) => {
                if let Some(payload) = self.process_animation(avatar, &data)?.payload() {
                    self.send_to(avatar, Outbound::Binary(payload.clone()))?;
                }
                Ok(())
            }
            Message::Audio(data) => {
                let visemes = self.process_audio(avatar, &data)?;
                let mut reply = Envelope::new(Message::Visemes(visemes));
                reply.id = id;
                self.send_to(avatar, Outbound::Message(reply))
            }
            Message::Control(data) => {
                self.handle_control(avatar, &data)?;
                let ack_id = id.unwrap_or_else(|| "control".to_string());
                self.send_to(avatar, Outbound::Message(Envelope::new(Message::Ack(AckData::ok(ack_id)))))
            }
            Message::Ping => {
                let mut reply = Envelope::new(Message::Pong);
                reply.id = id;
                self.send_to(avatar, Outbound::Message(reply))
            }
            other => Err(MorphcastError::InvalidMessage(format!(
                "unexpected {} message from client",
                other.message_type()
            ))),
        }
    }

    /// Aggregate metrics across sessions
    pub fn aggregate_metrics(&self) -> MetricsData {
        let per_session: Vec<MetricsData> = self
            .handles()
            .into_iter()
            .map(|(_, handle)| handle.lock().metrics_data())
            .collect();
        if per_session.is_empty() {
            return MetricsData::default();
        }
        let n = per_session.len() as f64;
        MetricsData {
            fps: per_session.iter().map(|m| m.fps).sum::<f64>() / n,
            latency_ms: per_session.iter().map(|m| m.latency_ms).sum::<f64>() / n,
            bandwidth_kbps: per_session.iter().map(|m| m.bandwidth_kbps).sum(),
            compression_ratio: per_session.iter().map(|m| m.compression_ratio).sum::<f64>() / n,
            dropped_frames: per_session.iter().map(|m| m.dropped_frames).sum(),
            ..Default::default()
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_config(&self.config)
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            status: "operational",
            metrics: self.aggregate_metrics(),
            capabilities: self.capabilities(),
            active_sessions: self.session_count(),
        }
    }
}
