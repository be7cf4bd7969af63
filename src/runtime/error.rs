use crate::runtime::validation::Validation;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Type assertion failed:\n{failures}")]
    AssertionFailed { failures: Validation },
    #[error("Type `{name}` is already registered in this context")]
    DuplicateTypeName { name: String },
    #[error("Unknown type `{name}`")]
    UnknownType { name: String },
    #[error("Unknown library member `{name}`")]
    UnknownFactory { name: String },
    #[error("`{factory}` expected {expected} but received {received}")]
    BadFactoryArgument {
        factory: String,
        expected: String,
        received: String,
    },
    #[error("Operation not supported: {message}")]
    Unsupported { message: String },
}
