use std::fmt;

use burrow_engine::EngineError;
use burrow_store::StoreError;

#[derive(Debug)]
pub enum DbError {
    Store(StoreError),
    Engine(EngineError),
    /// Unknown view or document.
    NotFound(String),
    /// Revision-tree conflict on write (stale or non-winning parent).
    Conflict(String),
    InvalidQueryOptions(String),
    /// The view has no registered map function.
    ViewNotDefined(String),
    InvalidDocument(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Store(e) => write!(f, "store error: {e}"),
            DbError::Engine(e) => write!(f, "engine error: {e}"),
            DbError::NotFound(what) => write!(f, "not found: {what}"),
            DbError::Conflict(msg) => write!(f, "conflict: {msg}"),
            DbError::InvalidQueryOptions(msg) => write!(f, "invalid query options: {msg}"),
            DbError::ViewNotDefined(name) => {
                write!(f, "view has no map function: {name}")
            }
            DbError::InvalidDocument(msg) => write!(f, "invalid document: {msg}"),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Store(e) => Some(e),
            DbError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for DbError {
    fn from(e: StoreError) -> Self {
        DbError::Store(e)
    }
}

impl From<EngineError> for DbError {
    fn from(e: EngineError) -> Self {
        DbError::Engine(e)
    }
}
