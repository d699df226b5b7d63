use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SessionEntry {
    #[error("Session {0} is connected")]
    Connected(Uuid),
    #[error("Session {0} is closed")]
    Closed(Uuid),
    #[error("Streaming started in {0} mode")]
    Started(String),
    #[error("Streaming stopped")]
    Stopped,
    #[error("Setting changed: {0}")]
    SettingChanged(String),
    #[error("Ignored unparseable control message: {0}")]
    UnparseableControl(String),
    #[error("Rejected control message: {0}")]
    RejectedControl(String),
    #[error("Frame {0} replaced by a newer frame while detector was busy")]
    FrameCoalesced(u64),
    #[error("Result of epoch {0} discarded after stop")]
    StaleResultDiscarded(u64),
    #[error("Frame processing failed: {0}")]
    FrameFailed(String),
    #[error("Failed to push result to peer: {0}")]
    PushFailed(String),
    #[error("Capture device acquired")]
    CaptureAcquired,
    #[error("Capture device released")]
    CaptureReleased,
}

impl From<SessionEntry> for String {
    #[inline(always)]
    fn from(value: SessionEntry) -> Self {
        value.to_string()
    }
}
