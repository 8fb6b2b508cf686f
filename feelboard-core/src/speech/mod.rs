//! Tap-to-speak driver.
//!
//! The `SpeechSynthesizer` trait wraps whatever speech facility the host
//! provides (a system TTS binary, a platform API, a silent logger). Voice
//! lists load asynchronously on some backends, so the driver gates on a
//! one-shot readiness wait with a bounded timeout before selecting a voice.
//!
//! Per utterance: `idle -> speaking -> {completed | failed}`. No retries.
//! Only one utterance is active at a time; re-entrant calls are refused with
//! `SpeechOutcome::Busy` so the host can disable its trigger while a prior
//! utterance is pending. Failures never propagate as hard errors — a tile
//! degrades to visual-only feedback.

pub mod stub;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Lang;
use crate::error::Result;

/// Bounded wait for the backend's voices-changed signal.
const VOICE_WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Metadata for one synthesizer voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Backend-specific identifier passed back to `speak`.
    pub id: String,
    pub name: String,
    /// BCP-47-ish language tag, e.g. "en", "en-US", "pt-BR".
    pub lang_tag: String,
    /// Whether the backend considers this its default voice.
    pub default: bool,
}

/// Contract for speech backends.
pub trait SpeechSynthesizer: Send + 'static {
    /// Whether synthesis is available at all on this host.
    fn is_supported(&mut self) -> bool {
        true
    }

    /// Current voice list; may be empty until the backend finishes loading.
    fn poll_voices(&mut self) -> Vec<VoiceInfo>;

    /// Block until the backend signals a voice-list change, bounded by
    /// `timeout`, then return whatever is available (possibly still empty).
    fn wait_for_voices(&mut self, timeout: Duration) -> Vec<VoiceInfo>;

    /// Speak `text`, blocking until the utterance completes.
    ///
    /// `voice` of `None` lets the backend pick its default.
    ///
    /// # Errors
    /// Returns an error when the utterance fails; the driver converts this
    /// to a soft `SpeechOutcome::Failed`.
    fn speak(&mut self, text: &str, voice: Option<&VoiceInfo>) -> Result<()>;
}

/// Thread-safe reference-counted handle to any `SpeechSynthesizer`.
#[derive(Clone)]
pub struct SynthesizerHandle(pub Arc<Mutex<dyn SpeechSynthesizer>>);

impl SynthesizerHandle {
    pub fn new<S: SpeechSynthesizer>(synth: S) -> Self {
        Self(Arc::new(Mutex::new(synth)))
    }
}

impl std::fmt::Debug for SynthesizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizerHandle").finish_non_exhaustive()
    }
}

/// Per-utterance state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    Idle,
    Speaking,
    Completed,
    Failed,
}

/// Soft outcome of a `speak` call. Never a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// The utterance played to completion.
    Completed,
    /// Synthesis started (or tried to) and failed; degrade to visual-only.
    Failed,
    /// No synthesis facility on this host.
    Unsupported,
    /// A previous utterance is still pending; call again once it resolves.
    Busy,
}

/// Language-aware, one-utterance-at-a-time speech front end.
pub struct SpeechDriver {
    synth: SynthesizerHandle,
    /// Resolved once per driver lifetime, after the readiness gate.
    voices: OnceLock<Vec<VoiceInfo>>,
    /// In-flight guard: set while an utterance is pending.
    speaking: AtomicBool,
    last_state: Mutex<UtteranceState>,
}

impl SpeechDriver {
    pub fn new(synth: SynthesizerHandle) -> Self {
        Self {
            synth,
            voices: OnceLock::new(),
            speaking: AtomicBool::new(false),
            last_state: Mutex::new(UtteranceState::Idle),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.synth.0.lock().is_supported()
    }

    /// State of the most recent utterance.
    pub fn last_state(&self) -> UtteranceState {
        *self.last_state.lock()
    }

    /// Speak `text` in `lang`, blocking until the utterance resolves.
    pub fn speak(&self, text: &str, lang: Lang) -> SpeechOutcome {
        if self
            .speaking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("utterance refused — previous one still pending");
            return SpeechOutcome::Busy;
        }

        let outcome = self.speak_locked(text, lang);
        self.speaking.store(false, Ordering::SeqCst);
        outcome
    }

    fn speak_locked(&self, text: &str, lang: Lang) -> SpeechOutcome {
        if !self.is_supported() {
            debug!("speech synthesis unsupported — visual feedback only");
            return SpeechOutcome::Unsupported;
        }

        *self.last_state.lock() = UtteranceState::Speaking;

        let voices = self.ensure_voices();
        let voice = select_voice(voices, lang);
        debug!(
            text,
            lang = %lang,
            voice = voice.map(|v| v.name.as_str()).unwrap_or("<default>"),
            "speaking"
        );

        let result = {
            let mut synth = self.synth.0.lock();
            synth.speak(text, voice)
        };

        match result {
            Ok(()) => {
                *self.last_state.lock() = UtteranceState::Completed;
                SpeechOutcome::Completed
            }
            Err(e) => {
                warn!(error = %e, "utterance failed — degrading to visual-only");
                *self.last_state.lock() = UtteranceState::Failed;
                SpeechOutcome::Failed
            }
        }
    }

    /// Resolve the voice list, waiting once (bounded) if it starts empty.
    fn ensure_voices(&self) -> &[VoiceInfo] {
        self.voices.get_or_init(|| {
            let mut synth = self.synth.0.lock();
            let immediate = synth.poll_voices();
            if !immediate.is_empty() {
                return immediate;
            }
            debug!("voice list empty — waiting for readiness signal");
            let after_wait = synth.wait_for_voices(VOICE_WAIT_TIMEOUT);
            if after_wait.is_empty() {
                warn!("no voices available after readiness wait — backend default will be used");
            }
            after_wait
        })
    }
}

/// Pick the best voice for a language: exact tag match, then tag prefix,
/// then the backend default.
pub fn select_voice(voices: &[VoiceInfo], lang: Lang) -> Option<&VoiceInfo> {
    let tag = lang.tag();
    voices
        .iter()
        .find(|v| v.lang_tag.eq_ignore_ascii_case(tag))
        .or_else(|| {
            voices
                .iter()
                .find(|v| v.lang_tag.to_ascii_lowercase().starts_with(tag))
        })
        .or_else(|| voices.iter().find(|v| v.default))
}
