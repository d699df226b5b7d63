pub mod pipeline;
pub mod request_handler;
