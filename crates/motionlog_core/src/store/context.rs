//! Working context over an attached store.
//!
//! # Responsibility
//! - Buffer uncommitted measurement writes.
//! - Commit buffered work atomically and serve committed-only reads.
//!
//! # Invariants
//! - Queries never observe pending (unsaved) measurements.
//! - `save` validates every pending record before touching SQL.
//! - A failed `save` leaves the pending buffer intact.
//!
//! # See also
//! - docs/architecture/data-stack.md

use crate::model::measurement::{BodyPart, BodySide, Measurement, MeasurementKind};
use crate::store::coordinator::StoreCoordinator;
use crate::store::{StoreError, StoreResult};
use log::{debug, info};
use rusqlite::{params, Row};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const MEASUREMENT_COLUMNS: &str =
    "uuid, type, timestamp, x, y, z, w, accuracy, body_side, body_part, is_local";

/// Working context bound to one coordinator.
///
/// Clones are cheap handles onto one shared pending buffer, so every
/// caller of a stack observes the same uncommitted state. Handle validity
/// ends at the next stack truncate; a stale handle fails with
/// [`StoreError::StoreDetached`] instead of touching a recreated file.
#[derive(Clone)]
pub struct DataContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    coordinator: Arc<StoreCoordinator>,
    pending: Mutex<Vec<Measurement>>,
}

impl DataContext {
    /// Creates a context over an attached coordinator.
    pub fn new(coordinator: Arc<StoreCoordinator>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                coordinator,
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Buffers one measurement for the next [`Self::save`].
    pub fn insert(&self, measurement: Measurement) {
        self.lock_pending().push(measurement);
    }

    /// Returns whether uncommitted work is buffered.
    pub fn has_pending_changes(&self) -> bool {
        !self.lock_pending().is_empty()
    }

    /// Returns the number of buffered, uncommitted measurements.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Discards all uncommitted work.
    pub fn rollback(&self) {
        let mut pending = self.lock_pending();
        if !pending.is_empty() {
            debug!(
                "event=context_rollback module=store status=ok discarded={}",
                pending.len()
            );
            pending.clear();
        }
    }

    /// Commits the buffered measurements in one transaction.
    ///
    /// Returns the number of rows written. The buffer lock is held for the
    /// whole commit so rows buffered by other handles mid-save cannot be
    /// silently dropped.
    ///
    /// # Errors
    /// - Returns [`StoreError::Validation`] for the first invalid record;
    ///   nothing is written.
    /// - Returns [`StoreError::StoreDetached`] on a stale handle.
    /// - Returns [`StoreError::Sqlite`] when the transaction fails.
    pub fn save(&self) -> StoreResult<usize> {
        let mut pending = self.lock_pending();
        if pending.is_empty() {
            return Ok(0);
        }
        for measurement in pending.iter() {
            measurement.validate()?;
        }

        let saved = self.inner.coordinator.with_store(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO measurements ({MEASUREMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);"
                ))?;
                for measurement in pending.iter() {
                    stmt.execute(params![
                        measurement.id.to_string(),
                        measurement.kind.as_str(),
                        measurement.timestamp,
                        measurement.x,
                        measurement.y,
                        measurement.z,
                        measurement.w,
                        measurement.accuracy,
                        measurement.body_side.as_str(),
                        measurement.body_part.as_str(),
                        i64::from(measurement.is_local),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(pending.len())
        })?;

        pending.clear();
        info!("event=context_save module=store status=ok rows={saved}");
        Ok(saved)
    }

    /// Counts committed measurements. Pending records are not visible.
    ///
    /// # Errors
    /// Returns [`StoreError::StoreDetached`] on a stale handle.
    pub fn measurement_count(&self) -> StoreResult<u64> {
        self.inner.coordinator.with_store(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM measurements;", [], |row| {
                row.get::<_, u64>(0)
            })?;
            Ok(count)
        })
    }

    /// Returns the newest committed measurements, newest first.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidData`] when a persisted row no longer
    /// parses into the model.
    pub fn fetch_recent(&self, limit: u32) -> StoreResult<Vec<Measurement>> {
        self.inner.coordinator.with_store(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEASUREMENT_COLUMNS} FROM measurements
                 ORDER BY timestamp DESC, uuid ASC LIMIT ?1;"
            ))?;
            let mut rows = stmt.query([i64::from(limit)])?;
            let mut measurements = Vec::new();
            while let Some(row) = rows.next()? {
                measurements.push(parse_measurement_row(row)?);
            }
            Ok(measurements)
        })
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<Measurement>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_measurement_row(row: &Row<'_>) -> StoreResult<Measurement> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        StoreError::InvalidData(format!("measurements.uuid holds invalid uuid `{uuid_text}`"))
    })?;

    let kind_text: String = row.get("type")?;
    let kind = MeasurementKind::parse(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!("measurements.type holds unknown kind `{kind_text}`"))
    })?;

    let side_text: String = row.get("body_side")?;
    let body_side = BodySide::parse(&side_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "measurements.body_side holds unknown side `{side_text}`"
        ))
    })?;

    let part_text: String = row.get("body_part")?;
    let body_part = BodyPart::parse(&part_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "measurements.body_part holds unknown part `{part_text}`"
        ))
    })?;

    let is_local = match row.get::<_, i64>("is_local")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "measurements.is_local holds unexpected value {other}"
            )))
        }
    };

    Ok(Measurement {
        id,
        kind,
        timestamp: row.get("timestamp")?,
        x: row.get("x")?,
        y: row.get("y")?,
        z: row.get("z")?,
        w: row.get("w")?,
        accuracy: row.get("accuracy")?,
        body_side,
        body_part,
        is_local,
    })
}
