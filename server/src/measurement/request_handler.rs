use crate::history::history::History;
use crate::measurement::pipeline::{Evaluation, FrameOptions, FramePipeline};
use crate::utils::error::ProcessError;
use crate::utils::logging::*;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct HandledRequest {
    /// `None` when the record could not be persisted.
    pub id: Option<i64>,
    pub evaluation: Evaluation,
}

/// Single-shot counterpart of a streaming session for uploaded images.
pub struct RequestHandler {
    pipeline: Arc<FramePipeline>,
    history: Arc<dyn History>,
}

impl RequestHandler {
    pub fn new(pipeline: Arc<FramePipeline>, history: Arc<dyn History>) -> Self {
        Self { pipeline, history }
    }

    pub async fn handle(&self, filename: String, image: Vec<u8>, confidence: f32) -> Result<HandledRequest, ProcessError> {
        let evaluation = match self.pipeline.evaluate(image, FrameOptions::untransformed(confidence)).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                err.log(None).await;
                return Err(err);
            }
        };
        let id = match self
            .history
            .save(filename, evaluation.measurement.clone(), evaluation.annotated.clone())
            .await
        {
            Ok(id) => Some(id),
            Err(err) => {
                logging_error!(HistoryEntry::SaveFailed(err.to_string()));
                None
            }
        };
        Ok(HandledRequest { id, evaluation })
    }
}
