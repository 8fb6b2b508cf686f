//! Per-session generation gating.
//!
//! Session state is an explicit struct owned by `SessionGate` and persisted
//! through a `SessionStore` at defined lifecycle points (initialize, each
//! accepted generation, clear) — no ambient key/value access. The in-memory
//! copy is authoritative: store failures are logged and never block the
//! interactive path, and absent prior state simply means "not on cooldown".

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Minimum enforced wait between accepted generation requests.
pub const COOLDOWN_MS: u64 = 5_000;

/// A session younger than this is considered "new".
const NEW_SESSION_WINDOW_MS: u64 = 5 * 60 * 1000;

/// Persisted per-session fields.
///
/// `session_start_ms == 0` means the session has not been initialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Set once on first initialization; never overwritten while the
    /// stored session persists.
    pub session_start_ms: u64,
    /// Updated every time a generation is accepted.
    pub last_generation_ms: Option<u64>,
    /// Monotonically increasing; no cap is enforced, only rate.
    pub avatars_created: u32,
}

/// Session-scoped persistence. Implementations are expected to drop their
/// contents when the session ends (process exit, explicit clear).
pub trait SessionStore: Send + Sync + 'static {
    fn load(&self) -> Result<Option<SessionState>>;
    fn save(&self, state: &SessionState) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// In-memory store: one process lifetime is one session.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<Option<SessionState>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionState>> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.state.lock() = None;
        Ok(())
    }
}

/// Whether a new generation may start right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum GenerationGate {
    Allowed,
    #[serde(rename_all = "camelCase")]
    CoolingDown { retry_after_secs: u64 },
}

impl GenerationGate {
    pub fn is_allowed(self) -> bool {
        matches!(self, GenerationGate::Allowed)
    }
}

/// Snapshot of the session for display/diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_start_ms: u64,
    pub last_generation_ms: Option<u64>,
    pub avatars_created: u32,
    pub gate: GenerationGate,
}

/// Enforces the cooldown between generation requests and tracks per-session
/// counters.
pub struct SessionGate {
    store: Arc<dyn SessionStore>,
    state: Mutex<SessionState>,
    cooldown_ms: u64,
}

impl SessionGate {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_cooldown(store, COOLDOWN_MS)
    }

    pub fn with_cooldown(store: Arc<dyn SessionStore>, cooldown_ms: u64) -> Self {
        Self {
            store,
            state: Mutex::new(SessionState::default()),
            cooldown_ms,
        }
    }

    /// Load persisted state and stamp the session start if absent.
    ///
    /// Idempotent: an already-set `session_start_ms` is never changed, no
    /// matter how many times this is called.
    pub fn initialize(&self) {
        let mut state = self.state.lock();
        if state.session_start_ms != 0 {
            return;
        }

        match self.store.load() {
            Ok(Some(stored)) if stored.session_start_ms != 0 => {
                debug!(
                    session_start_ms = stored.session_start_ms,
                    avatars_created = stored.avatars_created,
                    "resumed stored session"
                );
                *state = stored;
            }
            Ok(_) => {
                state.session_start_ms = now_ms();
                self.persist(&state);
                debug!(session_start_ms = state.session_start_ms, "session started");
            }
            Err(e) => {
                warn!(error = %e, "session store load failed — starting fresh");
                state.session_start_ms = now_ms();
            }
        }
    }

    /// Cooldown decision for the current wall-clock time. Does not mutate.
    pub fn can_generate(&self) -> GenerationGate {
        self.can_generate_at(now_ms())
    }

    /// Cooldown decision against an explicit clock reading.
    ///
    /// Pure function of `now_ms` and the recorded last generation time.
    pub fn can_generate_at(&self, now_ms: u64) -> GenerationGate {
        let state = self.state.lock();
        let Some(last) = state.last_generation_ms else {
            return GenerationGate::Allowed;
        };

        let elapsed = now_ms.saturating_sub(last);
        if elapsed >= self.cooldown_ms {
            GenerationGate::Allowed
        } else {
            let remaining_ms = self.cooldown_ms - elapsed;
            GenerationGate::CoolingDown {
                retry_after_secs: remaining_ms.div_ceil(1000),
            }
        }
    }

    /// Record that a generation was accepted.
    ///
    /// Call exactly once per accepted generation, after validation succeeds
    /// and before the personalization pipeline starts, so a slow pipeline
    /// still enforces the cooldown from request time.
    pub fn record_generation(&self) {
        let mut state = self.state.lock();
        state.last_generation_ms = Some(now_ms());
        self.persist(&state);
    }

    /// Bump the avatars-created counter. Independent of the cooldown check.
    pub fn increment_count(&self) -> u32 {
        let mut state = self.state.lock();
        state.avatars_created += 1;
        self.persist(&state);
        state.avatars_created
    }

    pub fn avatars_created(&self) -> u32 {
        self.state.lock().avatars_created
    }

    /// Snapshot for display.
    pub fn info(&self) -> SessionInfo {
        let gate = self.can_generate();
        let state = self.state.lock();
        SessionInfo {
            session_start_ms: state.session_start_ms,
            last_generation_ms: state.last_generation_ms,
            avatars_created: state.avatars_created,
            gate,
        }
    }

    /// Whether the session is less than five minutes old.
    pub fn is_new_session(&self) -> bool {
        let start = self.state.lock().session_start_ms;
        if start == 0 {
            return true;
        }
        now_ms().saturating_sub(start) < NEW_SESSION_WINDOW_MS
    }

    /// Clear the generation counter and cooldown (testing aid); the session
    /// start stays.
    pub fn reset_generation_state(&self) {
        let mut state = self.state.lock();
        state.avatars_created = 0;
        state.last_generation_ms = None;
        self.persist(&state);
    }

    /// Drop all session data, memory and store.
    pub fn clear(&self) {
        *self.state.lock() = SessionState::default();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "session store clear failed");
        }
    }

    fn persist(&self, state: &SessionState) {
        if let Err(e) = self.store.save(state) {
            warn!(error = %e, "session store save failed — keeping in-memory state");
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
