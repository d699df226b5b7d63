use crate::utils::config::Config;
use crate::utils::logging::*;
use actix_web::{get, post, web, HttpResponse, Responder, Scope};

pub fn initialize() -> Scope {
    web::scope("/config")
        .service(get_config)
        .service(update_config)
}

#[get("/get")]
async fn get_config() -> impl Responder {
    web::Json(Config::now().await)
}

#[post("/update")]
async fn update_config(config: web::Json<Config>) -> impl Responder {
    let config = config.into_inner();
    if !Config::validate(&config) {
        logging_notice!(SystemEntry::InvalidConfig);
        return HttpResponse::BadRequest().body("Invalid configuration.");
    }
    let frozen = Config::now().await.startup_fields_changed(&config);
    if !frozen.is_empty() {
        let entry = SystemEntry::StartupOnlyChanged(frozen.join(", "));
        let body = entry.to_string();
        logging_notice!(entry);
        return HttpResponse::BadRequest().body(body);
    }
    Config::update(config.clone()).await;
    match Config::save(&config).await {
        Ok(_) => {
            logging_information!(SystemEntry::ConfigUpdated);
            HttpResponse::Ok().finish()
        },
        Err(err) => {
            logging_error!(err);
            HttpResponse::InternalServerError().body("Configuration applied but not persisted.")
        },
    }
}
