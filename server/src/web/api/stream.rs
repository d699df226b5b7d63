use crate::server::services::Services;
use crate::session::settings::{SessionSettings, SettingsQuery};
use crate::utils::config::Config;
use crate::utils::logging::*;
use crate::web::utils::stream_websocket::StreamWebSocket;
use actix_web::{get, web, Error, HttpRequest, HttpResponse, Scope};
use actix_web_actors::ws::start;
use uuid::Uuid;

pub fn initialize() -> Scope {
    web::scope("/stream")
        .service(connect)
}

#[get("")]
async fn connect(req: HttpRequest, stream: web::Payload, query: web::Query<SettingsQuery>, services: web::Data<Services>) -> Result<HttpResponse, Error> {
    let config = Config::now().await;
    let defaults = match query.apply(SessionSettings::from_config(&config), config.max_frame_rate) {
        Ok(defaults) => defaults,
        Err(reason) => return Ok(HttpResponse::BadRequest().body(reason)),
    };
    let session_id = Uuid::new_v4();
    let peer = req.peer_addr().map(|addr| addr.to_string()).unwrap_or_else(|| "unknown".to_string());
    logging_information!(session_id, NetworkEntry::PeerConnect(peer.clone()), "");
    let session = StreamWebSocket::new(session_id, peer, defaults, config, services.get_ref().clone());
    start(session, &req, stream)
}
