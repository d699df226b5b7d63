use crate::history::history::{HistoryError, HistoryPage};
use crate::server::services::Services;
use crate::utils::config::Config;
use crate::utils::logging::*;
use actix_files::NamedFile;
use actix_web::http::header::ContentDisposition;
use actix_web::{delete, get, web, HttpRequest, HttpResponse, Scope};
use serde::Deserialize;

const DEFAULT_LIMIT: usize = 20;

pub fn initialize() -> Scope {
    web::scope("/history")
        .service(list)
        .service(export)
        .service(record)
        .service(remove)
        .service(image)
}

#[derive(Deserialize, Debug, Default)]
struct PageQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

impl PageQuery {
    fn resolve(&self, max_page_size: usize) -> (usize, usize) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).min(max_page_size);
        (limit, self.offset.unwrap_or(0))
    }
}

#[get("")]
async fn list(services: web::Data<Services>, query: web::Query<PageQuery>) -> HttpResponse {
    let (limit, offset) = query.resolve(Config::now().await.max_page_size);
    match services.history.list(limit, offset).await {
        Ok((records, total)) => HttpResponse::Ok().json(HistoryPage { records, total, limit, offset }),
        Err(err) => failure(err).await,
    }
}

#[get("/export")]
async fn export(services: web::Data<Services>) -> HttpResponse {
    match services.history.export_all().await {
        Ok(csv) => HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header(ContentDisposition::attachment("history.csv"))
            .body(csv),
        Err(err) => failure(err).await,
    }
}

#[get("/{id}")]
async fn record(services: web::Data<Services>, id: web::Path<i64>) -> HttpResponse {
    match services.history.get(id.into_inner()).await {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(err) => failure(err).await,
    }
}

#[delete("/{id}")]
async fn remove(services: web::Data<Services>, id: web::Path<i64>) -> HttpResponse {
    let id = id.into_inner();
    match services.history.delete(id).await {
        Ok(_) => {
            logging_information!(HistoryEntry::RecordDeleted(id));
            HttpResponse::Ok().finish()
        },
        Err(err) => failure(err).await,
    }
}

#[get("/{id}/image")]
async fn image(req: HttpRequest, services: web::Data<Services>, id: web::Path<i64>) -> HttpResponse {
    let entry = match services.history.get(id.into_inner()).await {
        Ok(found) => found,
        Err(err) => return failure(err).await,
    };
    let Some(path) = entry.image_path else {
        return HttpResponse::NotFound().body("Image not found.");
    };
    match NamedFile::open_async(&path).await {
        Ok(file) => file.into_response(&req),
        Err(err) => {
            logging_warning!(IOEntry::ReadFileError(path.display(), err));
            HttpResponse::NotFound().body("Image not found.")
        },
    }
}

async fn failure(err: HistoryError) -> HttpResponse {
    match err {
        HistoryError::NotFound(id) => {
            logging_notice!(HistoryEntry::RecordNotFound(id));
            HttpResponse::NotFound().body("Record not found.")
        },
        err => {
            logging_error!(HistoryEntry::WorkerFailure(err.to_string()));
            HttpResponse::InternalServerError().body("History store unavailable.")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::history::tests::MemoryHistory;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[::core::prelude::v1::test]
    fn page_defaults_and_cap() {
        assert_eq!(PageQuery::default().resolve(100), (20, 0));
        let query = PageQuery { limit: Some(500), offset: Some(40) };
        assert_eq!(query.resolve(100), (100, 40));
    }

    #[actix_web::test]
    async fn unknown_record_is_not_found() {
        let services = Services::fake(Arc::new(MemoryHistory::default()));
        let app = test::init_service(App::new().app_data(web::Data::new(services)).service(initialize())).await;
        let response = test::call_service(&app, test::TestRequest::get().uri("/history/7").to_request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = test::call_service(&app, test::TestRequest::delete().uri("/history/7").to_request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn export_is_a_csv_attachment() {
        let services = Services::fake(Arc::new(MemoryHistory::default()));
        let app = test::init_service(App::new().app_data(web::Data::new(services)).service(initialize())).await;
        let response = test::call_service(&app, test::TestRequest::get().uri("/history/export").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers().get("content-disposition").unwrap().to_str().unwrap();
        assert!(disposition.starts_with("attachment"));
    }

    #[actix_web::test]
    async fn broken_store_is_a_server_error() {
        let services = Services::fake(Arc::new(MemoryHistory::broken()));
        let app = test::init_service(App::new().app_data(web::Data::new(services)).service(initialize())).await;
        let request = test::TestRequest::get().uri("/history/export").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
