use crate::frame::transform::Rotation;
use crate::utils::config::Config;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Frames arrive as binary WebSocket messages.
    #[default]
    Client,
    /// Frames are pulled from the local capture device on a timer.
    Server,
}

impl Display for CaptureMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Client => write!(f, "client"),
            CaptureMode::Server => write!(f, "server"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct SessionSettings {
    pub confidence: f32,
    pub rotation: Rotation,
    pub flip: bool,
    pub frame_rate: u32,
    pub mode: CaptureMode,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            confidence: config.default_confidence,
            rotation: Rotation::try_from(config.default_rotation).unwrap_or_default(),
            flip: config.default_flip,
            frame_rate: config.default_frame_rate,
            mode: CaptureMode::Client,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.frame_rate.max(1)))
    }
}

/// Connection-time overrides taken from the `/stream` query string.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SettingsQuery {
    pub conf: Option<f32>,
    pub rotation: Option<u16>,
    pub flip: Option<bool>,
    pub fps: Option<u32>,
}

impl SettingsQuery {
    pub fn apply(&self, mut settings: SessionSettings, max_frame_rate: u32) -> Result<SessionSettings, String> {
        if let Some(confidence) = self.conf {
            if !Config::validate_confidence(confidence) {
                return Err(format!("conf must be within 0..=1, got {confidence}"));
            }
            settings.confidence = confidence;
        }
        if let Some(rotation) = self.rotation {
            settings.rotation = Rotation::try_from(rotation)?;
        }
        if let Some(flip) = self.flip {
            settings.flip = flip;
        }
        if let Some(frame_rate) = self.fps {
            if !Config::validate_frame_rate(frame_rate, max_frame_rate) {
                return Err(format!("fps must be within 1..={max_frame_rate}, got {frame_rate}"));
            }
            settings.frame_rate = frame_rate;
        }
        Ok(settings)
    }
}
