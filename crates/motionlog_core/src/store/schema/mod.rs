//! Embedded schema registry and migration executor.
//!
//! # Responsibility
//! - Resolve schema definitions by bundle and name.
//! - Apply pending schema steps atomically, in strictly increasing order.
//!
//! # Invariants
//! - Step versions must remain monotonic within one schema.
//! - The applied step version is mirrored to `PRAGMA user_version`.
//!
//! # See also
//! - docs/architecture/data-stack.md

use crate::store::{StoreError, StoreResult};
use log::info;
use rusqlite::Connection;

/// Bundle searched when a stack config names none.
pub const CORE_BUNDLE: &str = "motionlog";
/// Schema describing the measurement capture store.
pub const MEASUREMENT_SCHEMA: &str = "measurements";

/// One versioned DDL step of a schema definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SchemaStep {
    version: u32,
    sql: &'static str,
}

const MEASUREMENT_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        sql: include_str!("0001_create_measurements.sql"),
    },
    SchemaStep {
        version: 2,
        sql: include_str!("0002_device_placement.sql"),
    },
];

// The host app resolves data models from resource bundles; here a
// (bundle, name) pair selects one entry compiled into the binary.
const SCHEMAS: &[SchemaModel] = &[SchemaModel {
    bundle: CORE_BUNDLE,
    name: MEASUREMENT_SCHEMA,
    steps: MEASUREMENT_STEPS,
}];

/// A named, versioned schema definition resolved from the embedded
/// registry.
///
/// Copies are cheap; the definition itself lives in static storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaModel {
    bundle: &'static str,
    name: &'static str,
    steps: &'static [SchemaStep],
}

impl SchemaModel {
    /// Resolves a schema by bundle and name.
    ///
    /// `bundle = None` searches [`CORE_BUNDLE`], mirroring the host-app
    /// convention of loading resources from the main bundle by default.
    ///
    /// # Errors
    /// Returns [`StoreError::SchemaNotFound`] for an unknown pair.
    pub fn load(bundle: Option<&str>, name: &str) -> StoreResult<Self> {
        let bundle = bundle.unwrap_or(CORE_BUNDLE);
        SCHEMAS
            .iter()
            .find(|schema| schema.bundle == bundle && schema.name == name)
            .copied()
            .ok_or_else(|| StoreError::SchemaNotFound {
                bundle: bundle.to_string(),
                name: name.to_string(),
            })
    }

    pub fn bundle(&self) -> &'static str {
        self.bundle
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the newest step version of this schema.
    pub fn latest_version(&self) -> u32 {
        self.steps.last().map_or(0, |step| step.version)
    }

    /// Applies all steps newer than the file's current version.
    ///
    /// # Errors
    /// Returns [`StoreError::UnsupportedSchemaVersion`] when the file was
    /// written by a newer schema than this binary knows.
    pub fn apply_pending(&self, conn: &mut Connection) -> StoreResult<()> {
        let current = current_user_version(conn)?;
        let latest = self.latest_version();

        if current > latest {
            return Err(StoreError::UnsupportedSchemaVersion {
                file_version: current,
                latest_supported: latest,
            });
        }
        if current == latest {
            return Ok(());
        }

        let tx = conn.transaction()?;
        for step in self.steps {
            if step.version <= current {
                continue;
            }
            tx.execute_batch(step.sql)?;
            tx.execute_batch(&format!("PRAGMA user_version = {};", step.version))?;
        }
        tx.commit()?;

        info!(
            "event=schema_migrate module=store status=ok schema={} from_version={} to_version={}",
            self.name, current, latest
        );
        Ok(())
    }
}

pub(crate) fn current_user_version(conn: &Connection) -> StoreResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
