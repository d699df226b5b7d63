use crate::detection::annotator::Annotator;
use crate::detection::detector::Detector;
use crate::frame::codec::{decode_frame, encode_jpeg};
use crate::frame::transform::{apply_transform, Rotation};
use crate::utils::config::Config;
use crate::utils::error::ProcessError;
use crate::utils::logging::*;
use chrono::Local;
use common::mpn::measurement::{Measurement, MeasurementAssembler};
use std::sync::Arc;
use tokio::task::spawn_blocking;

/// One resolved frame: the measurement plus the annotated JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub measurement: Measurement,
    pub annotated: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameOptions {
    pub confidence: f32,
    pub rotation: Rotation,
    pub flip: bool,
}

impl FrameOptions {
    pub fn untransformed(confidence: f32) -> Self {
        Self {
            confidence,
            rotation: Rotation::None,
            flip: false,
        }
    }
}

/// decode, transform, detect, assemble, annotate. Shared by every session
/// and the upload route.
pub struct FramePipeline {
    detector: Arc<dyn Detector>,
    assembler: MeasurementAssembler<'static>,
    annotator: Arc<Annotator>,
    jpeg_quality: u8,
}

impl FramePipeline {
    pub fn new(detector: Arc<dyn Detector>, assembler: MeasurementAssembler<'static>, annotator: Arc<Annotator>, jpeg_quality: u8) -> Self {
        Self {
            detector,
            assembler,
            annotator,
            jpeg_quality,
        }
    }

    pub fn model_name(&self) -> String {
        self.detector.model_name()
    }

    pub async fn evaluate(&self, frame: Vec<u8>, options: FrameOptions) -> Result<Evaluation, ProcessError> {
        if !Config::validate_confidence(options.confidence) {
            return Err(ProcessError::InvalidInput(format!("Confidence {} is outside 0..=1", options.confidence)));
        }
        let image = spawn_blocking(move || decode_frame(&frame).map(|image| apply_transform(image, options.rotation, options.flip)))
            .await
            .map_err(|err| ProcessError::Internal(SystemEntry::TaskPanickedError(err.to_string()).into()))?
            .map_err(ProcessError::InvalidInput)?;
        let detections = self.detector.detect(&image, options.confidence).await?;
        let measurement = self.assembler.assemble(detections, Local::now())?;
        logging_debug!(MeasurementEntry::Resolved {
            pattern: measurement.pattern.to_string(),
            tubes: measurement.total_tubes,
        });
        let annotator = self.annotator.clone();
        let jpeg_quality = self.jpeg_quality;
        let record = measurement.clone();
        let annotated = spawn_blocking(move || {
            let mut image = image;
            annotator.draw(&mut image, &record);
            encode_jpeg(&image, jpeg_quality)
        })
        .await
        .map_err(|err| ProcessError::Internal(SystemEntry::TaskPanickedError(err.to_string()).into()))?
        .map_err(ProcessError::Internal)?;
        Ok(Evaluation { measurement, annotated })
    }
}
