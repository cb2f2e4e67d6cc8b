use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown match strategy '{0}'")]
    UnknownStrategy(String),
    #[error("unknown object kind '{0}'")]
    UnknownObjectKind(String),
    #[error("unknown mapping status '{0}'")]
    UnknownStatus(String),
    #[error("mapping key field '{0}' must not be empty")]
    EmptyKeyField(&'static str),
}

pub type Result<T> = std::result::Result<T, ModelError>;
