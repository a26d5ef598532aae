//! Error type shared by the interface layer and the action engine.
//!
//! Every failure maps onto one [`ErrorKind`]:
//!
//! - **Configuration**: malformed interface configuration, unresolvable export
//!   names, documents that fail to parse or validate, value shape mismatches.
//! - **Lookup**: diff state queried before any load, unknown action names.
//! - **Dependency**: bad action registrations (unknown, self, duplicate).
//! - **Action**: a bound action callable failed while running.
//! - **Io**: the underlying file or stream failed.
//!
//! Read-only variables skipped during a load are not errors.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Lookup,
    Dependency,
    Action,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid interface configuration: {0}")]
    InvalidConfig(String),

    #[error("block '{block}' has no variable named '{name}'")]
    UnresolvedExport { block: String, name: String },

    #[error("block '{0}' was dropped while its interface was still in use")]
    BlockDropped(String),

    #[error("document failed schema validation: {}", .0.join("; "))]
    InvalidDocument(Vec<String>),

    #[error("parse document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("variable '{name}' on block '{block}': {reason}")]
    ValueShape {
        block: String,
        name: String,
        reason: String,
    },

    #[error("flowsheet interface is not bound to a block")]
    Unbound,

    #[error("flowsheet interface is already bound to block '{0}'")]
    AlreadyBound(String),

    #[error("invalid options in {path}: {reason}")]
    InvalidOptions { path: PathBuf, reason: String },

    #[error("no document has been loaded yet")]
    NotLoaded,

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("action '{0}' is already registered")]
    DuplicateAction(String),

    #[error("action '{action}' depends on unknown action '{dependency}'")]
    UnknownDependency { action: String, dependency: String },

    #[error("action '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("action '{name}' failed")]
    Action {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{context} {}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stream i/o: {0}")]
    Stream(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_)
            | Error::UnresolvedExport { .. }
            | Error::BlockDropped(_)
            | Error::InvalidDocument(_)
            | Error::Parse(_)
            | Error::ValueShape { .. }
            | Error::Unbound
            | Error::AlreadyBound(_)
            | Error::InvalidOptions { .. } => ErrorKind::Configuration,
            Error::NotLoaded | Error::UnknownAction(_) => ErrorKind::Lookup,
            Error::DuplicateAction(_)
            | Error::UnknownDependency { .. }
            | Error::SelfDependency(_) => ErrorKind::Dependency,
            Error::Action { .. } => ErrorKind::Action,
            Error::Io { .. } | Error::Stream(_) => ErrorKind::Io,
        }
    }

    /// Unwrap the error raised by a failing action callable.
    ///
    /// Returns `Err(self)` for every other variant.
    pub fn into_action_source(self) -> std::result::Result<anyhow::Error, Error> {
        match self {
            Error::Action { source, .. } => Ok(source),
            other => Err(other),
        }
    }

    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
