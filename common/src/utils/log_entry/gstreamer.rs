use glib::error::Error as GError;
use gstreamer::StateChangeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GStreamerEntry {
    #[error("GStreamer initialization failed: {0}")]
    InitializeError(GError),
    #[error("Failed to create GStreamer pipeline: {0}")]
    CreatePipelineError(GError),
    #[error("Capture description did not produce a pipeline")]
    NotAPipeline,
    #[error("Capture pipeline has no frame sink")]
    MissingAppSink,
    #[error("Failed to set pipeline status: {0}")]
    PipelineSetStateError(StateChangeError),
    #[error("No frame arrived from capture device within {0} ms")]
    PullSampleTimeout(u64),
    #[error("Capture device delivered an empty sample")]
    EmptySample,
    #[error("Captured frame could not be decoded: {0}")]
    DecodeFrameError(String),
    #[error("Capture device released")]
    Released,
}

impl From<GStreamerEntry> for String {
    #[inline(always)]
    fn from(value: GStreamerEntry) -> Self {
        value.to_string()
    }
}
