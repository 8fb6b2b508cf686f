//! espeak-ng speech backend.
//!
//! Delegates synthesis to the system `espeak-ng` binary: voices come from
//! `espeak-ng --voices`, playback runs one blocking process per utterance.
//! A missing binary makes the backend report unsupported; the driver then
//! degrades to visual-only feedback.

use std::process::Command;
use std::time::Duration;

use feelboard_core::error::{BoardError, Result};
use feelboard_core::speech::{SpeechSynthesizer, VoiceInfo};
use tracing::{debug, warn};

const DEFAULT_BINARY: &str = "espeak-ng";

pub struct EspeakSynthesizer {
    binary: String,
    supported: Option<bool>,
}

impl EspeakSynthesizer {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            supported: None,
        }
    }

    fn probe(&mut self) -> bool {
        if let Some(cached) = self.supported {
            return cached;
        }
        let available = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);
        if !available {
            warn!(binary = %self.binary, "espeak-ng not found — speech unsupported");
        }
        self.supported = Some(available);
        available
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for EspeakSynthesizer {
    fn is_supported(&mut self) -> bool {
        self.probe()
    }

    fn poll_voices(&mut self) -> Vec<VoiceInfo> {
        if !self.probe() {
            return Vec::new();
        }
        let output = match Command::new(&self.binary).arg("--voices").output() {
            Ok(out) if out.status.success() => out,
            Ok(out) => {
                warn!(status = %out.status, "espeak-ng --voices failed");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "espeak-ng --voices failed to launch");
                return Vec::new();
            }
        };
        let listing = String::from_utf8_lossy(&output.stdout);
        let voices: Vec<VoiceInfo> = listing.lines().skip(1).filter_map(parse_voice_line).collect();
        debug!(count = voices.len(), "espeak-ng voices enumerated");
        voices
    }

    fn wait_for_voices(&mut self, _timeout: Duration) -> Vec<VoiceInfo> {
        // The espeak voice list is synchronous; there is no changed signal
        // to wait for, so the wait degenerates to a fresh poll.
        self.poll_voices()
    }

    fn speak(&mut self, text: &str, voice: Option<&VoiceInfo>) -> Result<()> {
        if !self.probe() {
            return Err(BoardError::SpeechUnavailable);
        }

        let mut command = Command::new(&self.binary);
        if let Some(voice) = voice {
            command.arg("-v").arg(&voice.id);
        }
        command.arg("--").arg(text);

        let status = command
            .status()
            .map_err(|e| BoardError::Speech(e.to_string()))?;
        if !status.success() {
            return Err(BoardError::Speech(format!(
                "espeak-ng exited with {status}"
            )));
        }
        Ok(())
    }
}

/// Parse one `espeak-ng --voices` data row.
///
/// Columns: `Pty Language Age/Gender VoiceName File Other Languages`.
fn parse_voice_line(line: &str) -> Option<VoiceInfo> {
    let mut fields = line.split_whitespace();
    let _pty = fields.next()?;
    let lang_tag = fields.next()?;
    let _age_gender = fields.next()?;
    let name = fields.next()?;
    Some(VoiceInfo {
        id: name.to_string(),
        name: name.to_string(),
        lang_tag: lang_tag.to_string(),
        default: lang_tag.eq_ignore_ascii_case("en"),
    })
}
