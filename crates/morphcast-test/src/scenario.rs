//! End-to-end scenarios
//!
//! Drive one avatar session on a manual clock: a frame source feeds
//! `animation` messages at a fixed input rate, a simulated client decodes
//! what comes back (optionally over a lossy link) and resyncs on gaps.

use std::collections::BTreeMap;
use std::sync::Arc;

use morphcast_core::{ManualClock, MorphFrame, MorphcastResult, QualityLevel};
use morphcast_runtime::{RuntimeConfig, SessionOrchestrator};
use morphcast_viseme::{PhonemeEvent, PhonemeMapper, VisemeTransitionEngine};
use morphcast_wire::{AnimationData, ControlAction, ControlData, Message};

use crate::{ClientStats, LinkConfig, LinkStats, LossyLink, SimulatedClient};

/// Scenario configuration
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Rate the source produces frames at
    pub input_fps: f64,
    /// Frames produced by the source
    pub frames: usize,
    pub quality: QualityLevel,
    /// `None` for a perfect link
    pub link: Option<LinkConfig>,
    pub runtime: RuntimeConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            input_fps: 60.0,
            frames: 120,
            quality: QualityLevel::High,
            link: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn minimal() -> Self {
        Self {
            frames: 12,
            ..Default::default()
        }
    }

    /// Lossy link, a few seconds of input
    pub fn stress() -> Self {
        Self {
            frames: 600,
            link: Some(LinkConfig::poor()),
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: QualityLevel) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_input_fps(mut self, fps: f64) -> Self {
        self.input_fps = fps;
        self
    }

    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = Some(link);
        self
    }
}

/// Result of a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub frames_sent: usize,
    pub frames_skipped: u64,
    pub client: ClientStats,
    pub link: Option<LinkStats>,
    /// Last frame reconstructed by the client
    pub final_frame: MorphFrame,
    /// Every frame the client applied, in order
    pub applied: Vec<MorphFrame>,
}

impl ScenarioResult {
    pub fn skip_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            self.frames_skipped as f64 / self.frames_sent as f64
        }
    }
}

/// Scenario harness
pub struct ScenarioHarness {
    config: ScenarioConfig,
    clock: Arc<ManualClock>,
    orchestrator: SessionOrchestrator,
}

impl ScenarioHarness {
    pub fn new(config: ScenarioConfig) -> Self {
        let clock = Arc::new(ManualClock::new(0.0));
        let orchestrator = SessionOrchestrator::new(config.runtime.clone(), clock.clone());
        Self {
            config,
            clock,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &SessionOrchestrator {
        &self.orchestrator
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Run `source(i)` for every input frame
    pub fn run(&self, mut source: impl FnMut(usize) -> MorphFrame) -> MorphcastResult<ScenarioResult> {
        let capacity = self.config.frames * 2 + 16;
        let mut client = SimulatedClient::connect(&self.orchestrator, "scenario", capacity)?;
        if let Some(link) = &self.config.link {
            client = client.with_link(LossyLink::new(link.clone()));
        }
        if self.config.quality != QualityLevel::default() {
            let control = ControlData::new(ControlAction::Quality)
                .with_param("level", self.config.quality.as_str());
            client.send(&self.orchestrator, Message::Control(control))?;
        }

        let dt = 1.0 / self.config.input_fps.max(1.0);
        let mut applied = Vec::new();
        for i in 0..self.config.frames {
            let frame = source(i);
            let blendshapes: BTreeMap<String, f64> = frame
                .iter()
                .map(|(key, value)| (key.as_str().to_string(), value))
                .collect();
            client.send(&self.orchestrator, Message::Animation(AnimationData::new(blendshapes)))?;
            applied.extend(client.pump()?);
            client.resync_if_needed(&self.orchestrator)?;
            self.clock.advance(dt);
        }

        let frames_skipped = {
            let handle = self.orchestrator.session(client.avatar())?;
            let session = handle.lock();
            session.monitor().dropped_frames()
        };
        self.orchestrator.disconnect(client.avatar());
        applied.extend(client.pump()?);

        Ok(ScenarioResult {
            frames_sent: self.config.frames,
            frames_skipped,
            client: client.stats().clone(),
            link: client.link().map(|l| l.stats().clone()),
            final_frame: client.current().clone(),
            applied,
        })
    }
}

/// Transition-engine output for `(phoneme, seconds)` pairs laid end to end
pub fn speech_frames(phonemes: &[(&str, f64)]) -> Vec<MorphFrame> {
    let mapper = PhonemeMapper::new();
    let mut timestamp = 0.0;
    let events: Vec<PhonemeEvent> = phonemes
        .iter()
        .map(|(phoneme, duration)| {
            let event = PhonemeEvent::new(mapper.viseme_for(phoneme), *duration, timestamp)
                .with_phoneme(phoneme);
            timestamp += duration;
            event
        })
        .collect();
    VisemeTransitionEngine::default().process_phoneme_sequence(&events, None)
}
