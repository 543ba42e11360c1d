use thiserror::Error;

/// The failures a user is shown. Per-file detail stays in the logs.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum EditorError {
    /// Nothing usable could be imported.
    #[error("invalid format")]
    InvalidFormat,
    #[error("export failed")]
    ExportFailed,
}
