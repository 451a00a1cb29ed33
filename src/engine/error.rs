// src/engine/error.rs

use thiserror::Error;

/// Crate-wide error type. Every failure is raised synchronously at the
/// point of detection; no operation partially commits before failing.
#[derive(Error, Debug)]
pub enum Error {
    /// Structural or semantic inconsistency: shape conflicts, alignment
    /// failure, invalid dimension subsets, bad concat arguments.
    #[error("{0}")]
    Value(String),

    /// A name or coordinate lookup that found nothing.
    #[error("key not found: {0}")]
    Key(String),

    /// Wrong argument shape or type, e.g. grouped-object arithmetic with
    /// an unlabeled operand.
    #[error("{0}")]
    Type(String),

    /// Recognized but unsupported input shape.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Coarse error taxonomy, so callers can branch on the kind of failure
/// without matching message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Value,
    Key,
    Type,
    NotImplemented,
    Arrow,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Value(_) => ErrorKind::Value,
            Error::Key(_) => ErrorKind::Key,
            Error::Type(_) => ErrorKind::Type,
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::Arrow(_) => ErrorKind::Arrow,
        }
    }

    pub fn value(msg: impl Into<String>) -> Self {
        Error::Value(msg.into())
    }

    pub fn key(msg: impl Into<String>) -> Self {
        Error::Key(msg.into())
    }

    pub fn type_err(msg: impl Into<String>) -> Self {
        Error::Type(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Error::NotImplemented(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
