use std::io::Error as IOError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkEntry {
    #[error("Failed to bind port: {0}")]
    BindPortError(IOError),
    #[error("Peer {0} is connected")]
    PeerConnect(String),
    #[error("Peer {0} closed the connection")]
    PeerDisconnect(String),
    #[error("WebSocket protocol error: {0}")]
    ProtocolError(String),
    #[error("Receive unexpected frame")]
    UnexpectedFrame,
}

impl From<NetworkEntry> for String {
    #[inline(always)]
    fn from(value: NetworkEntry) -> Self {
        value.to_string()
    }
}
