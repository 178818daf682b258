//! Lazily chained data stack over the measurement store.
//!
//! # Responsibility
//! - Resolve the schema -> coordinator -> context chain on demand.
//! - Tear the chain down around a destroyed backing file and let it
//!   rebuild transparently.
//!
//! # Invariants
//! - Context creation and truncation are serialized on the designated
//!   executor and never interleave.
//! - After `truncate` the coordinator and context slots are empty and the
//!   backing file is gone; the schema slot stays resolved.
//! - A schema-load or store-attach failure terminates the process.
//!
//! # See also
//! - docs/architecture/data-stack.md

use crate::exec::{Executor, ExecutorExt};
use crate::lazy::LazySlot;
use crate::store::context::DataContext;
use crate::store::coordinator::{AttachOptions, StoreCoordinator};
use crate::store::schema::SchemaModel;
use crate::store::StoreError;
use log::{error, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Static identity of one data stack.
#[derive(Debug, Clone)]
pub struct DataStackConfig {
    /// Schema bundle override; `None` selects the core bundle.
    pub bundle: Option<String>,
    /// Schema name resolved from the embedded registry.
    pub schema_name: String,
    /// Backing file name inside `data_dir`.
    pub database_name: String,
    /// Host-provided absolute data directory.
    pub data_dir: PathBuf,
}

impl DataStackConfig {
    /// Creates a config resolving `schema_name` from the core bundle.
    pub fn new(
        schema_name: impl Into<String>,
        database_name: impl Into<String>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bundle: None,
            schema_name: schema_name.into(),
            database_name: database_name.into(),
            data_dir: data_dir.into(),
        }
    }
}

/// Lifecycle snapshot for diagnostics surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackStatus {
    /// The schema slot holds a resolved schema.
    pub schema_resolved: bool,
    /// The coordinator slot holds an attachment.
    pub coordinator_resolved: bool,
    /// The resolved coordinator still has a live store attached.
    pub store_attached: bool,
    /// The context slot holds a working context.
    pub context_resolved: bool,
    /// The backing file currently exists on disk.
    pub database_file_exists: bool,
}

/// Lazily assembled persistence stack for one backing file.
///
/// One instance owns the schema, coordinator and context slots plus the
/// backing-file identity. Construction performs no I/O; every resource
/// resolves on first use and rebuilds transparently after
/// [`Self::truncate`].
pub struct DataStack {
    database_path: PathBuf,
    executor: Arc<dyn Executor>,
    schema_slot: LazySlot<SchemaModel>,
    coordinator_slot: LazySlot<Arc<StoreCoordinator>>,
    context_slot: LazySlot<DataContext>,
}

impl DataStack {
    /// Builds a stack from its static identity and the executor that owns
    /// context-affine work.
    pub fn new(config: DataStackConfig, executor: Arc<dyn Executor>) -> Self {
        let database_path = config.data_dir.join(&config.database_name);

        let schema_slot = {
            let bundle = config.bundle.clone();
            let schema_name = config.schema_name.clone();
            LazySlot::new(move || load_schema(bundle.as_deref(), &schema_name))
        };

        let coordinator_slot = {
            let schema_slot = schema_slot.clone();
            let database_path = database_path.clone();
            LazySlot::new(move || {
                let schema = schema_slot.get_or_create();
                attach_store(schema, &database_path)
            })
        };

        let context_slot = {
            let coordinator_slot = coordinator_slot.clone();
            LazySlot::with_affinity(Arc::clone(&executor), move || {
                DataContext::new(coordinator_slot.get_or_create())
            })
        };

        Self {
            database_path,
            executor,
            schema_slot,
            coordinator_slot,
            context_slot,
        }
    }

    /// Returns the resolved schema, loading it on first use.
    pub fn schema(&self) -> SchemaModel {
        self.schema_slot.get_or_create()
    }

    /// Returns the attached coordinator, attaching on first use.
    ///
    /// Resolution runs on the calling thread; only context-path access is
    /// serialized on the designated executor.
    pub fn coordinator(&self) -> Arc<StoreCoordinator> {
        self.coordinator_slot.get_or_create()
    }

    /// Returns the working context, creating it on the designated
    /// executor.
    pub fn context(&self) -> DataContext {
        self.context_slot.get_or_create_on_executor()
    }

    /// Destroys the backing store and resets the chain for rebuild.
    ///
    /// Runs as one unit on the designated executor, serialized against
    /// context creation: rolls back pending context work, detaches the
    /// store, deletes the backing file (absence is tolerated), then
    /// empties the context and coordinator slots. The schema slot stays
    /// resolved; the schema definition is embedded and independent of the
    /// backing file.
    pub fn truncate(&self) {
        let context_slot = self.context_slot.clone();
        let coordinator_slot = self.coordinator_slot.clone();
        let database_path = self.database_path.clone();

        self.executor.run_sync(move || {
            if let Some(context) = context_slot.ready() {
                context.rollback();
            }
            if let Some(coordinator) = coordinator_slot.ready() {
                if let Err(err) = coordinator.detach_store() {
                    error!("event=truncate module=store status=error step=detach error={err}");
                }
            }
            match std::fs::remove_file(&database_path) {
                Ok(()) => info!(
                    "event=truncate module=store status=ok path={}",
                    database_path.display()
                ),
                Err(err) if err.kind() == ErrorKind::NotFound => info!(
                    "event=truncate module=store status=ok path={} note=file_absent",
                    database_path.display()
                ),
                Err(err) => warn!(
                    "event=truncate module=store status=error step=delete path={} error={}",
                    database_path.display(),
                    err
                ),
            }
            context_slot.reset();
            coordinator_slot.reset();
        });
    }

    /// Returns the backing file size in bytes, 0 when the file is absent.
    ///
    /// Pure file-system query; resolves no slot.
    pub fn database_size_bytes(&self) -> u64 {
        match std::fs::metadata(&self.database_path) {
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        }
    }

    /// Returns the derived backing-file path.
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Returns a lifecycle snapshot for diagnostics.
    pub fn status(&self) -> StackStatus {
        let coordinator = self.coordinator_slot.ready();
        let coordinator_resolved = coordinator.is_some();
        let store_attached = coordinator.is_some_and(|c| c.is_attached());
        StackStatus {
            schema_resolved: self.schema_slot.ready().is_some(),
            coordinator_resolved,
            store_attached,
            context_resolved: self.context_slot.ready().is_some(),
            database_file_exists: self.database_path.exists(),
        }
    }
}

fn load_schema(bundle: Option<&str>, name: &str) -> SchemaModel {
    match SchemaModel::load(bundle, name) {
        Ok(schema) => {
            info!(
                "event=schema_load module=store status=ok schema={} latest_version={}",
                schema.name(),
                schema.latest_version()
            );
            schema
        }
        Err(err) => fail_fast("schema_load", &err),
    }
}

fn attach_store(schema: SchemaModel, database_path: &Path) -> Arc<StoreCoordinator> {
    match StoreCoordinator::attach(schema, database_path, AttachOptions::default()) {
        Ok(coordinator) => Arc::new(coordinator),
        Err(err) => fail_fast("store_attach", &err),
    }
}

/// Logs the diagnostic and terminates the process. Schema-load and
/// store-attach failures leave the stack unable to serve any request.
#[cold]
fn fail_fast(event: &str, err: &StoreError) -> ! {
    error!("event={event} module=store status=fatal error={err}");
    std::process::abort();
}
