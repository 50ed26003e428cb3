use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("mapping id must not be empty")]
    InvalidMappingId(String),
    #[error("group name must not be empty")]
    InvalidGroupName(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
