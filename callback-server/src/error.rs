use thiserror::Error;

/// Errors raised while starting or stopping the callback server.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("no available port found in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("failed to bind callback server: {0}")]
    Bind(String),

    #[error("callback server failed to start")]
    StartFailed,
}

pub type Result<T> = std::result::Result<T, CallbackError>;
