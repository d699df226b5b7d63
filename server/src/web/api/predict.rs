use crate::server::services::Services;
use crate::session::message::ResultPayload;
use crate::utils::config::Config;
use crate::utils::error::ProcessError;
use actix_multipart::{Field, Multipart};
use actix_web::{post, web, HttpResponse, Scope};
use futures::{StreamExt, TryStreamExt};
use sanitize_filename::sanitize;
use serde::Serialize;

const DEFAULT_FILENAME: &str = "upload.jpg";

pub fn initialize() -> Scope {
    web::scope("/predict")
        .service(predict)
}

#[derive(Serialize)]
struct PredictResponse {
    id: Option<i64>,
    #[serde(flatten)]
    result: ResultPayload,
}

#[post("")]
async fn predict(services: web::Data<Services>, mut payload: Multipart) -> Result<HttpResponse, ProcessError> {
    let mut upload = None;
    let mut confidence = None;
    while let Some(mut field) = payload.try_next().await.map_err(|err| ProcessError::InvalidInput(err.to_string()))? {
        let Some(content_disposition) = field.content_disposition() else {
            return Err(ProcessError::InvalidInput("Multipart field without content disposition".to_string()));
        };
        let field_name = content_disposition.get_name().unwrap_or_default().to_string();
        let file_name = content_disposition.get_filename().map(sanitize_upload_name);
        match field_name.as_str() {
            "file" => upload = Some((file_name.unwrap_or_else(|| DEFAULT_FILENAME.to_string()), read_field(&mut field).await?)),
            "conf" => confidence = Some(parse_confidence(&read_field(&mut field).await?)?),
            _ => {
                read_field(&mut field).await?;
            },
        }
    }
    let Some((filename, image)) = upload else {
        return Err(ProcessError::InvalidInput("Missing file field".to_string()));
    };
    if image.is_empty() {
        return Err(ProcessError::InvalidInput("Uploaded file is empty".to_string()));
    }
    let confidence = match confidence {
        Some(confidence) => confidence,
        None => Config::now().await.default_confidence,
    };
    let handled = services.requests.handle(filename, image, confidence).await?;
    Ok(HttpResponse::Ok().json(PredictResponse {
        id: handled.id,
        result: ResultPayload::from(&handled.evaluation),
    }))
}

async fn read_field(field: &mut Field) -> Result<Vec<u8>, ProcessError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|err| ProcessError::InvalidInput(err.to_string()))?;
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn sanitize_upload_name(file_name: &str) -> String {
    let sanitized = sanitize(file_name);
    if sanitized.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

fn parse_confidence(data: &[u8]) -> Result<f32, ProcessError> {
    let text = String::from_utf8_lossy(data);
    let confidence = text
        .trim()
        .parse::<f32>()
        .map_err(|_| ProcessError::InvalidInput(format!("conf is not a number: {}", text.trim())))?;
    if Config::validate_confidence(confidence) {
        Ok(confidence)
    } else {
        Err(ProcessError::InvalidInput(format!("conf must be within 0..=1, got {confidence}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;

    #[test]
    fn confidence_field_is_parsed_and_bounded() {
        assert_eq!(parse_confidence(b" 0.4 ").unwrap(), 0.4);
        assert_eq!(parse_confidence(b"1").unwrap(), 1.0);
        assert_eq!(parse_confidence(b"1.5").unwrap_err().kind(), ErrorKind::InputValidation);
        assert_eq!(parse_confidence(b"high").unwrap_err().kind(), ErrorKind::InputValidation);
    }

    #[test]
    fn upload_names_are_sanitized() {
        assert!(!sanitize_upload_name("../../etc/passwd").contains('/'));
        assert_eq!(sanitize_upload_name("rack 01.jpg"), "rack 01.jpg");
        assert_eq!(sanitize_upload_name("/"), DEFAULT_FILENAME);
    }
}
