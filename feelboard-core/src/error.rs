use thiserror::Error;

/// All errors produced by feelboard-core.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("please wait {retry_after_secs} more seconds before creating another avatar")]
    CooldownActive { retry_after_secs: u64 },

    #[error(transparent)]
    Rejected(#[from] RejectReason),

    #[error("image decode error: {0}")]
    ImageDecode(String),

    #[error("compose service error: {0}")]
    Compose(String),

    #[error("personalization failed for every tile")]
    AllTilesFailed,

    #[error("no personalization run is in progress")]
    NotRunning,

    #[error("speech synthesis is not available on this system")]
    SpeechUnavailable,

    #[error("speech synthesis error: {0}")]
    Speech(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// User-facing reasons an uploaded photo was rejected.
///
/// The `Display` string is shown to the user verbatim. An attempt that is
/// rejected is never retried automatically; the user must resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("please upload an image file (JPG, PNG, etc.)")]
    UnsupportedType,

    #[error("file size must be less than {limit_mib} MB")]
    TooLarge { limit_mib: u64 },

    #[error("the image could not be read")]
    Unreadable,

    #[error("image content is not appropriate for this application")]
    UnsafeContent,

    #[error("please upload a photo with exactly one face")]
    FaceCount { found: usize },

    #[error("failed to process image")]
    ProcessingFailed,
}

pub type Result<T> = std::result::Result<T, BoardError>;
