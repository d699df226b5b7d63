pub mod config;
pub mod health;
pub mod history;
pub mod log;
pub mod predict;
pub mod stream;
