use thiserror::Error;

/// Errors that can occur when using dialogs.
#[derive(Error, Debug)]
pub enum DialogError {
    /// An error occurred in the underlying platform implementation.
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// The requested feature is not supported on this platform.
    #[error("Not supported: {0}")]
    NotSupported(String),
}
