use crate::utils::logging::Logger;
use actix_web::{get, web, HttpResponse, Responder, Scope};
use chrono::{DateTime, Local};
use uuid::Uuid;

pub fn initialize() -> Scope {
    web::scope("/log")
        .service(system_log)
        .service(system_log_since)
        .service(session_log)
}

#[get("/system_log")]
async fn system_log() -> impl Responder {
    let system_log = Logger::get_system_logs().await;
    HttpResponse::Ok().body(Logger::format_logs(&system_log))
}

#[get("/system_log/since/{since}")]
async fn system_log_since(since: web::Path<String>) -> impl Responder {
    match parse_datetime(&since.into_inner()) {
        Ok(since_time) => {
            let logs = Logger::get_system_logs_since(since_time).await;
            HttpResponse::Ok().body(Logger::format_logs(&logs))
        },
        Err(_) => HttpResponse::BadRequest().body("Invalid datetime format."),
    }
}

#[get("/{session_id}")]
async fn session_log(session_id: web::Path<Uuid>) -> impl Responder {
    match Logger::get_session_logs(session_id.into_inner()).await {
        Some(session_log) => HttpResponse::Ok().body(Logger::format_logs(&session_log)),
        None => HttpResponse::NotFound().body("Session not found."),
    }
}

fn parse_datetime(datetime_str: &str) -> Result<DateTime<Local>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(datetime_str).map(|datetime| datetime.with_timezone(&Local))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_timestamps_are_accepted() {
        assert!(parse_datetime("2024-05-01T08:30:00+08:00").is_ok());
        assert!(parse_datetime("2024-05-01T00:30:00Z").is_ok());
    }

    #[test]
    fn other_formats_are_rejected() {
        assert!(parse_datetime("2024-05-01-08-30-00").is_err());
        assert!(parse_datetime("yesterday").is_err());
    }
}
