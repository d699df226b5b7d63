use crate::server::server::Server;

pub mod capture;
pub mod detection;
pub mod frame;
pub mod history;
pub mod measurement;
pub mod server;
pub mod session;
pub mod utils;
pub mod web;

#[actix_web::main]
async fn main() {
    Server::run().await;
    Server::terminate().await;
}
