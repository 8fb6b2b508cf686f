//! `SilentSynthesizer` — placeholder backend that logs instead of speaking.
//!
//! Lets the tap-to-speak path run end-to-end on hosts without a TTS
//! facility; utterances are recorded and logged, never voiced.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::error::Result;
use crate::speech::{SpeechSynthesizer, VoiceInfo};

pub struct SilentSynthesizer {
    voices: Vec<VoiceInfo>,
    spoken: Mutex<Vec<String>>,
}

impl SilentSynthesizer {
    pub fn new() -> Self {
        let voice = |id: &str, lang_tag: &str, default: bool| VoiceInfo {
            id: id.to_string(),
            name: id.to_string(),
            lang_tag: lang_tag.to_string(),
            default,
        };
        Self {
            voices: vec![
                voice("silent-en", "en", true),
                voice("silent-es", "es", false),
                voice("silent-pt", "pt", false),
            ],
            spoken: Mutex::new(Vec::new()),
        }
    }

    /// Utterances observed so far, oldest first.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

impl Default for SilentSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for SilentSynthesizer {
    fn poll_voices(&mut self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    fn wait_for_voices(&mut self, _timeout: Duration) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    fn speak(&mut self, text: &str, voice: Option<&VoiceInfo>) -> Result<()> {
        info!(
            text,
            voice = voice.map(|v| v.name.as_str()).unwrap_or("<default>"),
            "[silent] utterance"
        );
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}
