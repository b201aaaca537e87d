use crate::backend::BackendError;

// Session errors
#[derive(Debug, thiserror::Error)]
pub enum VrError {
    #[error("Failed to initialize VR runtime: {0}")]
    Initialization(BackendError),

    #[error("An action manifest is already installed")]
    ManifestAlreadyInstalled,

    #[error("VR session is not running")]
    NotRunning,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Context task failed: {0}")]
    Task(String),
}
