use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown pass in configuration: {0}")]
    UnknownPass(String),

    #[error("Pass '{pass}' depends on '{dependency}', which is not registered before it")]
    PassOrdering {
        pass: &'static str,
        dependency: &'static str,
    },

    #[error("Structural defect after pass '{pass}': {message}")]
    StructuralDefect { pass: String, message: String },

    #[error("Pass '{pass}' panicked: {message}")]
    PassPanicked { pass: String, message: String },
}

pub type Result<T> = std::result::Result<T, NormalizeError>;
