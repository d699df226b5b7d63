use crate::frame::codec::encode_jpeg;
use crate::utils::config::Config;
use common::mpn::detection::{BoundingBox, Detection};
use futures::future::BoxFuture;
use futures::FutureExt;
use image::RgbImage;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Failed to start detector: {0}")]
    Spawn(std::io::Error),
    #[error("Failed to hand frame to detector: {0}")]
    Feed(std::io::Error),
    #[error("Detector did not answer within {0} seconds")]
    Timeout(u64),
    #[error("Detector exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("Detector output is not valid: {0}")]
    Output(String),
    #[error("Frame could not be encoded for detector: {0}")]
    Encode(String),
}

/// Object detector shared by every session and upload request.
pub trait Detector: Send + Sync {
    fn detect<'a>(&'a self, image: &'a RgbImage, confidence: f32) -> BoxFuture<'a, Result<Vec<Detection>, DetectorError>>;

    fn model_name(&self) -> String;
}

#[derive(Deserialize)]
struct CornerDetection {
    label: String,
    confidence: f32,
    bbox: [f32; 4],
}

/// Runs the detection script once per frame. The frame goes to stdin as JPEG,
/// stdout carries a JSON array of corner boxes.
pub struct ScriptDetector {
    program: String,
    script: String,
    model_path: String,
    timeout: u64,
    jpeg_quality: u8,
}

impl ScriptDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.detector_program.clone(),
            script: config.detector_script.clone(),
            model_path: config.model_path.clone(),
            timeout: config.detector_timeout,
            jpeg_quality: config.jpeg_quality,
        }
    }

    async fn run(&self, image: &RgbImage, confidence: f32) -> Result<Vec<Detection>, DetectorError> {
        let frame = encode_jpeg(image, self.jpeg_quality).map_err(DetectorError::Encode)?;
        let mut child = Command::new(&self.program)
            .arg(&self.script)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--conf")
            .arg(confidence.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DetectorError::Spawn)?;
        let stdin = child.stdin.take();
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&frame).await.map_err(DetectorError::Feed)?;
            }
            child.wait_with_output().await.map_err(DetectorError::Spawn)
        };
        // Dropping the exchange on expiry kills the child.
        let output = timeout(Duration::from_secs(self.timeout), exchange)
            .await
            .map_err(|_| DetectorError::Timeout(self.timeout))??;
        if !output.status.success() {
            return Err(DetectorError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_output(&output.stdout)
    }
}

impl Detector for ScriptDetector {
    fn detect<'a>(&'a self, image: &'a RgbImage, confidence: f32) -> BoxFuture<'a, Result<Vec<Detection>, DetectorError>> {
        self.run(image, confidence).boxed()
    }

    fn model_name(&self) -> String {
        Path::new(&self.model_path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| self.model_path.clone())
    }
}

pub fn parse_output(stdout: &[u8]) -> Result<Vec<Detection>, DetectorError> {
    let detections: Vec<CornerDetection> = serde_json::from_slice(stdout).map_err(|err| DetectorError::Output(err.to_string()))?;
    Ok(detections
        .into_iter()
        .map(|detection| {
            let [x1, y1, x2, y2] = detection.bbox;
            Detection::new(detection.label, detection.confidence, BoundingBox::from_corners(x1, y1, x2, y2))
        })
        .collect())
}
