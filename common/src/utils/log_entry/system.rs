use std::io::Error as IoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SystemEntry {
    #[error("Online now")]
    Online,
    #[error("Initializing")]
    Initializing,
    #[error("Initialization completed")]
    InitializeComplete,
    #[error("Termination in process")]
    Terminating,
    #[error("Termination completed")]
    TerminateComplete,
    #[error("Invalid configuration")]
    InvalidConfig,
    #[error("Configuration not found")]
    ConfigNotFound,
    #[error("Unable to parse configuration file")]
    ConfigParseError,
    #[error("Configuration updated")]
    ConfigUpdated,
    #[error("Fields read only at startup cannot be changed at runtime: {0}")]
    StartupOnlyChanged(String),
    #[error("Web service ready")]
    WebReady,
    #[error("Web service panic: {0}")]
    WebPanic(IoError),
    #[error("Reference table ready with {0} patterns")]
    ReferenceTableReady(usize),
    #[error("Reference table is invalid: {0}")]
    ReferenceTableInvalid(String),
    #[error("Font could not be loaded, captions disabled: {0}")]
    FontUnavailable(String),
    #[error("Blocking task panic while execution: {0}")]
    TaskPanickedError(String),
}

impl From<SystemEntry> for String {
    #[inline(always)]
    fn from(value: SystemEntry) -> Self {
        value.to_string()
    }
}
