use thiserror::Error;

/// Unified result type for the panel crate.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Errors surfaced by the panel runtime and its collaborators.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cluster transport error: {0}")]
    Transport(String),
    #[error("display channel error: {0}")]
    Display(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
