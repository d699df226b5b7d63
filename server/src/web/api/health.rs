use crate::server::services::Services;
use actix_web::{get, web, HttpResponse, Responder, Scope};
use serde_json::json;

pub fn initialize() -> Scope {
    web::scope("/health")
        .service(health)
}

#[get("")]
async fn health(services: web::Data<Services>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "model": services.pipeline.model_name(),
    }))
}
