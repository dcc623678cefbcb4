//! Error types for diagram operations.
//!
//! Model mutations reject bad input with [`Error::Validation`] or
//! [`Error::Reference`] before touching anything. Loading reports broken
//! documents with [`Error::Integrity`]. [`Error::Consistency`] means the
//! undo history and the model have diverged.

use std::{fmt, io};

use thiserror::Error;

/// The kind of entity an id refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Swimlane,
    Outcome,
    Blob,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Swimlane => "swimlane",
            EntityKind::Outcome => "outcome",
            EntityKind::Blob => "blob",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("unknown {kind} id {id}")]
    Reference { kind: EntityKind, id: u64 },

    #[error("document integrity error: {0}")]
    Integrity(String),

    #[error("history out of sync with diagram: {0}")]
    Consistency(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn reference(kind: EntityKind, id: u64) -> Self {
        Self::Reference { kind, id }
    }

    pub(crate) fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub(crate) fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
