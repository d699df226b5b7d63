use crate::utils::config::Config;
use crate::utils::logging::*;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use std::sync::Arc;

/// Produces encoded frames on demand for server-side capture.
pub trait FrameSource: Send + Sync {
    /// Blocks for at most the source's timeout.
    fn grab(&self) -> Result<Vec<u8>, GStreamerEntry>;
}

/// Opens a frame source for one streaming session.
pub type CaptureOpener = Arc<dyn Fn(&Config) -> Result<Arc<dyn FrameSource>, GStreamerEntry> + Send + Sync>;

/// Local camera behind a GStreamer pipeline that always holds the newest
/// JPEG frame. The pipeline is stopped when the device is dropped.
pub struct CaptureDevice {
    pipeline: gstreamer::Pipeline,
    sink: AppSink,
    timeout: u64,
}

impl CaptureDevice {
    pub fn pipeline_description(source: &str) -> String {
        format!("{source} ! videoconvert ! jpegenc ! appsink name=sink max-buffers=1 drop=true sync=false")
    }

    pub fn open(config: &Config) -> Result<Self, GStreamerEntry> {
        Self::open_source(&config.capture_source, config.capture_timeout)
    }

    pub fn opener() -> CaptureOpener {
        Arc::new(|config: &Config| Self::open(config).map(|device| Arc::new(device) as Arc<dyn FrameSource>))
    }

    pub fn open_source(source: &str, timeout: u64) -> Result<Self, GStreamerEntry> {
        gstreamer::init().map_err(GStreamerEntry::InitializeError)?;
        let pipeline = gstreamer::parse::launch(&Self::pipeline_description(source))
            .map_err(GStreamerEntry::CreatePipelineError)?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| GStreamerEntry::NotAPipeline)?;
        let sink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or(GStreamerEntry::MissingAppSink)?;
        if let Err(err) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(GStreamerEntry::PipelineSetStateError(err));
        }
        Ok(Self {
            pipeline,
            sink,
            timeout,
        })
    }
}

impl FrameSource for CaptureDevice {
    fn grab(&self) -> Result<Vec<u8>, GStreamerEntry> {
        let sample = self
            .sink
            .try_pull_sample(gstreamer::ClockTime::from_mseconds(self.timeout))
            .ok_or(GStreamerEntry::PullSampleTimeout(self.timeout))?;
        let buffer = sample.buffer().ok_or(GStreamerEntry::EmptySample)?;
        let map = buffer.map_readable().map_err(|_| GStreamerEntry::EmptySample)?;
        Ok(map.as_slice().to_vec())
    }
}

impl Drop for CaptureDevice {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the same frame on every grab and counts the grabs.
    pub(crate) struct StillSource {
        pub(crate) frame: Vec<u8>,
        pub(crate) grabs: AtomicUsize,
    }

    impl StillSource {
        pub(crate) fn new(frame: Vec<u8>) -> Self {
            Self {
                frame,
                grabs: AtomicUsize::new(0),
            }
        }
    }

    impl FrameSource for StillSource {
        fn grab(&self) -> Result<Vec<u8>, GStreamerEntry> {
            self.grabs.fetch_add(1, Ordering::SeqCst);
            Ok(self.frame.clone())
        }
    }

    #[test]
    fn description_ends_in_a_dropping_sink() {
        let description = CaptureDevice::pipeline_description("videotestsrc");
        assert!(description.starts_with("videotestsrc ! videoconvert ! jpegenc"));
        assert!(description.ends_with("appsink name=sink max-buffers=1 drop=true sync=false"));
    }
}
