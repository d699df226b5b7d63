use crate::frame::transform::Rotation;
use crate::session::settings::CaptureMode;
use crate::utils::config::Config;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Streaming has not been started")]
    NotStreaming,
    #[error("Streaming is already running")]
    AlreadyStreaming,
    #[error("Session is closed")]
    Closed,
    #[error("No measurement to save yet")]
    NothingToSave,
    #[error("Invalid value for {action}: {reason}")]
    InvalidValue { action: String, reason: String },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ControlCommand {
    Start(CaptureMode),
    Stop,
    SetConfidence(f32),
    SetRotation(Rotation),
    SetFlip(bool),
    SetFrameRate(u32),
    Save,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlParseError {
    /// Not a control message at all. Logged and otherwise ignored.
    #[error("{0}")]
    Unparseable(String),
    /// A known action with a bad value. Reported back to the peer.
    #[error("{0}")]
    Rejected(SessionError),
}

#[derive(Deserialize)]
struct RawControl {
    action: String,
    #[serde(default)]
    value: Option<Value>,
}

pub fn parse_control(text: &str, max_frame_rate: u32) -> Result<ControlCommand, ControlParseError> {
    let raw: RawControl = serde_json::from_str(text).map_err(|err| ControlParseError::Unparseable(err.to_string()))?;
    let action = raw.action.trim().to_ascii_lowercase();
    let invalid = |reason: String| {
        ControlParseError::Rejected(SessionError::InvalidValue {
            action: action.clone(),
            reason,
        })
    };
    match action.as_str() {
        "start" => match raw.value.as_ref().map(value_as_text) {
            None => Ok(ControlCommand::Start(CaptureMode::Client)),
            Some(Some(mode)) if mode == "client" => Ok(ControlCommand::Start(CaptureMode::Client)),
            Some(Some(mode)) if mode == "server" => Ok(ControlCommand::Start(CaptureMode::Server)),
            Some(_) => Err(invalid("mode must be \"client\" or \"server\"".to_string())),
        },
        "stop" => Ok(ControlCommand::Stop),
        "save" => Ok(ControlCommand::Save),
        "set_conf" => {
            let confidence = raw.value.as_ref().and_then(value_as_number).ok_or_else(|| invalid("expected a number".to_string()))?;
            let confidence = confidence as f32;
            if Config::validate_confidence(confidence) {
                Ok(ControlCommand::SetConfidence(confidence))
            } else {
                Err(invalid(format!("{confidence} is outside 0..=1")))
            }
        }
        "set_rotation" => {
            let degrees = raw.value.as_ref().and_then(value_as_number).ok_or_else(|| invalid("expected a number".to_string()))?;
            if degrees.fract() != 0.0 || !(0.0..=f64::from(u16::MAX)).contains(&degrees) {
                return Err(invalid(format!("{degrees} is not a right angle")));
            }
            Rotation::try_from(degrees as u16).map(ControlCommand::SetRotation).map_err(invalid)
        }
        "set_flip" => raw
            .value
            .as_ref()
            .and_then(value_as_bool)
            .map(ControlCommand::SetFlip)
            .ok_or_else(|| invalid("expected a boolean".to_string())),
        "set_fps" => {
            let frame_rate = raw.value.as_ref().and_then(value_as_number).ok_or_else(|| invalid("expected a number".to_string()))?;
            if frame_rate.fract() == 0.0 && frame_rate >= 0.0 && Config::validate_frame_rate(frame_rate as u32, max_frame_rate) {
                Ok(ControlCommand::SetFrameRate(frame_rate as u32))
            } else {
                Err(invalid(format!("{frame_rate} is outside 1..={max_frame_rate}")))
            }
        }
        other => Err(ControlParseError::Unparseable(format!("unknown action {other:?}"))),
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    value.as_str().map(|text| text.trim().to_ascii_lowercase())
}

/// Numbers may also arrive as numeric strings.
fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|number| number.is_finite()),
        _ => None,
    }
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
