pub mod server;
pub mod services;
