//! Storage lifecycle: schema registry, store attachment, working context,
//! and the lazily chained data stack.
//!
//! # Responsibility
//! - Own every interaction with the SQLite backing file.
//! - Keep the schema -> coordinator -> context dependency chain explicit.
//!
//! # Invariants
//! - A coordinator is never constructed without a resolved schema.
//! - A context is never constructed without an attached coordinator.
//! - After `DataStack::truncate` the backing file does not exist and the
//!   coordinator and context slots are empty; the schema slot is retained.
//!
//! # See also
//! - docs/architecture/data-stack.md

use crate::model::measurement::MeasurementValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod context;
pub mod coordinator;
pub mod schema;
mod stack;

pub use context::DataContext;
pub use coordinator::{AttachOptions, StoreCoordinator};
pub use schema::{SchemaModel, MEASUREMENT_SCHEMA};
pub use stack::{DataStack, DataStackConfig, StackStatus};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer error for schema resolution, attachment and context use.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying storage engine failure.
    Sqlite(rusqlite::Error),
    /// File-system failure while preparing the backing file location.
    Io(std::io::Error),
    /// No embedded schema matches the requested bundle and name.
    SchemaNotFound { bundle: String, name: String },
    /// The backing file was written by a newer schema than this build knows.
    UnsupportedSchemaVersion {
        file_version: u32,
        latest_supported: u32,
    },
    /// The backing file needs migration but automatic migration is off.
    MigrationRequired {
        file_version: u32,
        latest_supported: u32,
    },
    /// The store was detached; the handle predates a truncate.
    StoreDetached,
    /// A buffered measurement violates the persistence rules.
    Validation(MeasurementValidationError),
    /// A persisted row no longer parses into the model.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::SchemaNotFound { bundle, name } => {
                write!(f, "schema `{name}` not found in bundle `{bundle}`")
            }
            Self::UnsupportedSchemaVersion {
                file_version,
                latest_supported,
            } => write!(
                f,
                "backing file schema version {file_version} is newer than supported version {latest_supported}"
            ),
            Self::MigrationRequired {
                file_version,
                latest_supported,
            } => write!(
                f,
                "backing file is at schema version {file_version} but migration to {latest_supported} is disabled"
            ),
            Self::StoreDetached => write!(f, "persistent store is detached from its coordinator"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<MeasurementValidationError> for StoreError {
    fn from(err: MeasurementValidationError) -> Self {
        Self::Validation(err)
    }
}
