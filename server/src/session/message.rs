use crate::measurement::pipeline::Evaluation;
use crate::session::settings::SessionSettings;
use crate::session::stream_session::SessionState;
use crate::utils::error::ErrorKind;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::mpn::measurement::Measurement;
use serde::Serialize;

/// Result shape shared by the stream and the upload route.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResultPayload {
    /// Base64 JPEG.
    pub image: String,
    #[serde(flatten)]
    pub measurement: Measurement,
}

impl From<&Evaluation> for ResultPayload {
    fn from(evaluation: &Evaluation) -> Self {
        Self {
            image: STANDARD.encode(&evaluation.annotated),
            measurement: evaluation.measurement.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Result(ResultPayload),
    Status {
        #[serde(flatten)]
        state: SessionState,
        settings: SessionSettings,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
    Saved {
        id: i64,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::transform::Rotation;
    use crate::session::settings::CaptureMode;
    use chrono::Local;
    use common::mpn::detection::{BoundingBox, Detection};
    use common::mpn::measurement::MeasurementAssembler;
    use common::mpn::pattern_resolver::{PatternResolver, PositiveLabel};
    use common::mpn::reference_table::ReferenceTable;
    use serde_json::{json, Value};

    #[test]
    fn result_carries_the_measurement_fields() {
        let assembler = MeasurementAssembler::new(PatternResolver::new(ReferenceTable::instance(), PositiveLabel::default()));
        let detections = vec![Detection::new("Positive", 0.9, BoundingBox::new(10.0, 0.0, 5.0, 5.0))];
        let evaluation = Evaluation {
            measurement: assembler.assemble(detections, Local::now()).unwrap(),
            annotated: b"jpeg".to_vec(),
        };
        let value: Value = serde_json::from_str(&OutboundMessage::Result(ResultPayload::from(&evaluation)).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["image"], "anBlZw==");
        assert_eq!(value["pattern"], "P100");
        assert_eq!(value["mpn"], "3.6");
        assert_eq!(value["ci_low"], "0.17");
        assert_eq!(value["ci_high"], "18");
        assert_eq!(value["total_tubes"], 1);
        assert_eq!(value["risk"], "Low");
        assert_eq!(value["detections"][0]["bbox"], json!([10.0, 0.0, 5.0, 5.0]));
    }

    #[test]
    fn status_reports_state_and_settings() {
        let message = OutboundMessage::Status {
            state: SessionState::Streaming(CaptureMode::Server),
            settings: SessionSettings {
                confidence: 0.5,
                rotation: Rotation::Quarter,
                flip: false,
                frame_rate: 3,
                mode: CaptureMode::Server,
            },
        };
        let value: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["state"], "streaming");
        assert_eq!(value["mode"], "server");
        assert_eq!(value["settings"]["rotation"], 90);
    }

    #[test]
    fn error_names_its_kind() {
        let message = OutboundMessage::Error {
            kind: ErrorKind::InputValidation,
            message: "Streaming has not been started".to_string(),
        };
        assert_eq!(message.to_json().unwrap(), r#"{"type":"error","kind":"input_validation","message":"Streaming has not been started"}"#);
    }
}
