use crate::capture::capture_device::CaptureOpener;
use crate::history::history::History;
use crate::measurement::pipeline::FramePipeline;
use crate::measurement::request_handler::RequestHandler;
use std::sync::Arc;

/// Shared collaborators handed to every route and streaming session.
#[derive(Clone)]
pub struct Services {
    pub pipeline: Arc<FramePipeline>,
    pub history: Arc<dyn History>,
    pub requests: Arc<RequestHandler>,
    pub capture: CaptureOpener,
}

impl Services {
    pub fn new(pipeline: Arc<FramePipeline>, history: Arc<dyn History>, capture: CaptureOpener) -> Self {
        let requests = Arc::new(RequestHandler::new(pipeline.clone(), history.clone()));
        Self {
            pipeline,
            history,
            requests,
            capture,
        }
    }
}

#[cfg(test)]
impl Services {
    pub(crate) fn fake(history: Arc<dyn History>) -> Self {
        use crate::detection::detector::tests::FakeDetector;
        use crate::measurement::pipeline::tests::two_tubes;
        Self::fake_with(Arc::new(FakeDetector::answering(two_tubes())), history)
    }

    /// Server capture yields a still test frame.
    pub(crate) fn fake_with(detector: Arc<crate::detection::detector::tests::FakeDetector>, history: Arc<dyn History>) -> Self {
        use crate::capture::capture_device::tests::StillSource;
        use crate::capture::capture_device::FrameSource;
        use crate::measurement::pipeline::tests::{frame, pipeline_with};
        let capture: CaptureOpener = Arc::new(|_: &crate::utils::config::Config| Ok::<_, crate::utils::logging::GStreamerEntry>(Arc::new(StillSource::new(frame())) as Arc<dyn FrameSource>));
        Self::new(Arc::new(pipeline_with(detector)), history, capture)
    }
}
