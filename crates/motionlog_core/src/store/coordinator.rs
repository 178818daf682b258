//! Persistent store coordinator: schema-bound attachment to the backing
//! file.
//!
//! # Responsibility
//! - Open and bootstrap the SQLite backing file for one schema.
//! - Own the live connection and its detach lifecycle.
//!
//! # Invariants
//! - A returned coordinator holds a bootstrapped, fully migrated store.
//! - After `detach_store` every store access fails with `StoreDetached`.
//!
//! # See also
//! - docs/architecture/data-stack.md

use crate::store::schema::{self, SchemaModel};
use crate::store::{StoreError, StoreResult};
use log::{debug, error, info};
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Attachment behavior flags.
///
/// The data stack attaches with the defaults: an older file is migrated
/// in place and a missing file is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOptions {
    /// Apply pending schema steps to an older file during attach.
    pub auto_migrate: bool,
    /// Create the backing file and its parent directories when absent.
    pub create_if_missing: bool,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            auto_migrate: true,
            create_if_missing: true,
        }
    }
}

/// Coordinates one schema-validated SQLite attachment.
pub struct StoreCoordinator {
    schema: SchemaModel,
    database_path: PathBuf,
    store: Mutex<Option<Connection>>,
}

impl fmt::Debug for StoreCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCoordinator")
            .field("schema", &self.schema.name())
            .field("database_path", &self.database_path)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl StoreCoordinator {
    /// Opens the backing file and binds it to `schema`.
    ///
    /// Bootstrap order: open (honoring `create_if_missing`), enable
    /// foreign keys, set the busy timeout, verify `user_version`, migrate
    /// when allowed.
    ///
    /// # Side effects
    /// - Emits `store_attach` logging events with duration and status.
    ///
    /// # Errors
    /// - Returns [`StoreError::UnsupportedSchemaVersion`] for a file from
    ///   a newer build.
    /// - Returns [`StoreError::MigrationRequired`] for a stale file when
    ///   `auto_migrate` is off.
    /// - Returns [`StoreError::Sqlite`] / [`StoreError::Io`] for engine
    ///   and file-system failures.
    pub fn attach(
        schema: SchemaModel,
        database_path: impl Into<PathBuf>,
        options: AttachOptions,
    ) -> StoreResult<Self> {
        let database_path = database_path.into();
        let started_at = Instant::now();
        info!(
            "event=store_attach module=store status=start schema={} path={}",
            schema.name(),
            database_path.display()
        );

        match Self::open_store(&schema, &database_path, options) {
            Ok(conn) => {
                info!(
                    "event=store_attach module=store status=ok schema={} duration_ms={}",
                    schema.name(),
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    schema,
                    database_path,
                    store: Mutex::new(Some(conn)),
                })
            }
            Err(err) => {
                error!(
                    "event=store_attach module=store status=error schema={} duration_ms={} error={}",
                    schema.name(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn open_store(
        schema: &SchemaModel,
        database_path: &Path,
        options: AttachOptions,
    ) -> StoreResult<Connection> {
        let mut flags = OpenFlags::default();
        if options.create_if_missing {
            if let Some(parent) = database_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        } else {
            flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
        }

        let mut conn = Connection::open_with_flags(database_path, flags)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let current = schema::current_user_version(&conn)?;
        let latest = schema.latest_version();
        if current > latest {
            return Err(StoreError::UnsupportedSchemaVersion {
                file_version: current,
                latest_supported: latest,
            });
        }
        if current < latest {
            if !options.auto_migrate {
                return Err(StoreError::MigrationRequired {
                    file_version: current,
                    latest_supported: latest,
                });
            }
            schema.apply_pending(&mut conn)?;
        }
        Ok(conn)
    }

    /// Returns the schema this coordinator is bound to.
    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    /// Returns the backing file path.
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Returns whether a live store is currently attached.
    pub fn is_attached(&self) -> bool {
        self.lock_store().is_some()
    }

    /// Closes the attachment. A second detach is a no-op.
    ///
    /// # Errors
    /// Returns the close error reported by the storage engine; the handle
    /// is released regardless, so the backing file can be removed.
    pub fn detach_store(&self) -> StoreResult<()> {
        let Some(conn) = self.lock_store().take() else {
            debug!("event=store_detach module=store status=skipped reason=not_attached");
            return Ok(());
        };
        match conn.close() {
            Ok(()) => {
                info!(
                    "event=store_detach module=store status=ok path={}",
                    self.database_path.display()
                );
                Ok(())
            }
            Err((conn, err)) => {
                drop(conn);
                Err(StoreError::Sqlite(err))
            }
        }
    }

    /// Runs `operation` against the attached store.
    ///
    /// Store access is serialized by the coordinator, so callers never
    /// observe a half-detached connection.
    ///
    /// # Errors
    /// Returns [`StoreError::StoreDetached`] when no store is attached.
    pub(crate) fn with_store<R>(
        &self,
        operation: impl FnOnce(&Connection) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let guard = self.lock_store();
        match guard.as_ref() {
            Some(conn) => operation(conn),
            None => Err(StoreError::StoreDetached),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, Option<Connection>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
