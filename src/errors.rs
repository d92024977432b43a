use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Physics engine error: {0}")]
    Engine(String),

    #[error("Controller error: {0}")]
    Controller(String),
}

/// Fail fast when a batched buffer does not have the agreed length.
pub fn ensure_shape(
    what: &'static str,
    expected: usize,
    got: usize,
) -> Result<(), EnvironmentError> {
    if expected != got {
        return Err(EnvironmentError::ShapeMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}
