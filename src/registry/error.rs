/// Errors that can occur during registry operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("invalid model definition: {0}")]
    InvalidModel(String),

    /// The backing store could not be reached
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}
