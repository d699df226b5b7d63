pub mod control;
pub mod message;
pub mod settings;
pub mod stream_session;
