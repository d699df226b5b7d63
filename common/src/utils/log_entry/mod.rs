pub mod gstreamer;
pub mod history;
pub mod io;
pub mod measurement;
pub mod network;
pub mod session;
pub mod system;
