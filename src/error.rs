use thiserror::Error;

use crate::database::VectorStoreError;
use crate::document::DocumentError;

#[derive(Error, Debug)]
pub enum PayslipError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Model call failed: {0}")]
    Model(#[from] anyhow::Error),
    #[error("Vector store error: {0}")]
    Store(#[from] VectorStoreError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, PayslipError>;
