use std::io;
use std::time::Duration;

use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// A request parameter could not be interpreted. Out-of-range numbers
    /// are clamped instead and never produce this.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("capture did not complete within {0:?}")]
    CaptureTimedOut(Duration),

    #[error("remote api is shutting down")]
    ShuttingDown,

    /// Readback or encoding failed on the main loop.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("script execution failed: {0}")]
    ScriptExecutionFailed(String),

    #[error("failed to start listener on port {port}: {source}")]
    ListenerStartFailed { port: u16, source: BoxedError },

    #[error("settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RemoteError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidParameter { .. } => 400,
            Self::ShuttingDown => 503,
            Self::CaptureTimedOut(_) => 504,
            _ => 500,
        }
    }
}
