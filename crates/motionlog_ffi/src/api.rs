//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the measurement data stack to Dart via FRB.
//! - Keep error semantics simple for early-stage UI integration.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - The process owns at most one data stack; reconfiguration is rejected.
//!
//! # See also
//! - docs/architecture/data-stack.md

use log::info;
use motionlog_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    DataStack, DataStackConfig, Measurement, MeasurementKind, SerialExecutor, MEASUREMENT_SCHEMA,
};
use std::path::Path;
use std::sync::{Arc, OnceLock};

const STORE_DB_FILE_NAME: &str = "motion.sqlite3";
const STORE_EXECUTOR_NAME: &str = "motionlog-store";
static DATA_STACK: OnceLock<DataStack> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - UI-thread safe for current implementation.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - UI-thread safe for current implementation.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Generic action response envelope for store command flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreActionResponse {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Stable ID of the measurement the command touched, when one exists.
    pub measurement_id: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl StoreActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            measurement_id: None,
            message: message.into(),
        }
    }

    fn success_with_id(message: impl Into<String>, measurement_id: String) -> Self {
        Self {
            ok: true,
            measurement_id: Some(measurement_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            measurement_id: None,
            message: message.into(),
        }
    }
}

/// Response envelope for count queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementCountResponse {
    /// Whether the query succeeded.
    pub ok: bool,
    /// Committed measurement count; 0 when `ok` is false.
    pub count: u64,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

/// Lifecycle snapshot of the process-wide data stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackStatusResponse {
    /// Whether `configure_data_stack` has succeeded in this process.
    pub configured: bool,
    pub schema_resolved: bool,
    pub coordinator_resolved: bool,
    pub store_attached: bool,
    pub context_resolved: bool,
    pub database_file_exists: bool,
    pub database_size_bytes: u64,
}

/// Builds the process-wide data stack rooted at `data_dir`.
///
/// Input semantics:
/// - `data_dir`: absolute data directory provided by the host platform.
///
/// # FFI contract
/// - Sync call; spawns the store executor thread on success.
/// - A second call after a success is rejected, with any directory.
/// - Never panics; returns an envelope with a diagnostic message.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_data_stack(data_dir: String) -> StoreActionResponse {
    let trimmed = data_dir.trim();
    if trimmed.is_empty() {
        return StoreActionResponse::failure("data_dir cannot be empty");
    }
    if !Path::new(trimmed).is_absolute() {
        return StoreActionResponse::failure(format!(
            "data_dir must be an absolute path, got `{trimmed}`"
        ));
    }
    if DATA_STACK.get().is_some() {
        return StoreActionResponse::failure("data stack already configured");
    }

    let executor = match SerialExecutor::spawn(STORE_EXECUTOR_NAME) {
        Ok(executor) => Arc::new(executor),
        Err(err) => {
            return StoreActionResponse::failure(format!("failed to spawn store executor: {err}"))
        }
    };
    let config = DataStackConfig::new(MEASUREMENT_SCHEMA, STORE_DB_FILE_NAME, trimmed);

    match DATA_STACK.set(DataStack::new(config, executor)) {
        Ok(()) => {
            info!("event=ffi_configure module=ffi status=ok data_dir={trimmed}");
            StoreActionResponse::success("data stack configured")
        }
        Err(_) => StoreActionResponse::failure("data stack already configured"),
    }
}

/// Buffers one measurement in the working context.
///
/// Input semantics:
/// - `kind`: canonical snake_case kind name, for example `attitude` or
///   `rotation_rate`.
/// - `w`: required for `attitude` samples, rejected for all others.
///
/// # FFI contract
/// - Sync call; the first call per process attaches the store.
/// - Buffers only; nothing is committed until `save_pending`.
/// - Never panics; invalid input is rejected with a message.
#[flutter_rust_bridge::frb(sync)]
pub fn record_measurement(
    kind: String,
    timestamp: f64,
    x: f64,
    y: f64,
    z: f64,
    w: Option<f64>,
) -> StoreActionResponse {
    let Some(stack) = DATA_STACK.get() else {
        return StoreActionResponse::failure("data stack not configured");
    };
    let Some(kind) = MeasurementKind::parse(kind.trim()) else {
        return StoreActionResponse::failure(format!("unknown measurement kind `{kind}`"));
    };

    let mut measurement = Measurement::new(kind, timestamp, x, y, z);
    measurement.w = w;
    if let Err(err) = measurement.validate() {
        return StoreActionResponse::failure(err.to_string());
    }

    let measurement_id = measurement.id.to_string();
    stack.context().insert(measurement);
    StoreActionResponse::success_with_id("measurement buffered", measurement_id)
}

/// Commits all buffered measurements in one transaction.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; a failed save keeps the buffer for retry.
#[flutter_rust_bridge::frb(sync)]
pub fn save_pending() -> StoreActionResponse {
    let Some(stack) = DATA_STACK.get() else {
        return StoreActionResponse::failure("data stack not configured");
    };
    match stack.context().save() {
        Ok(rows) => StoreActionResponse::success(format!("saved {rows} measurement(s)")),
        Err(err) => StoreActionResponse::failure(format!("save_pending failed: {err}")),
    }
}

/// Counts committed measurements; buffered records are not included.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn measurement_count() -> MeasurementCountResponse {
    let Some(stack) = DATA_STACK.get() else {
        return MeasurementCountResponse {
            ok: false,
            count: 0,
            message: "data stack not configured".to_string(),
        };
    };
    match stack.context().measurement_count() {
        Ok(count) => MeasurementCountResponse {
            ok: true,
            count,
            message: String::new(),
        },
        Err(err) => MeasurementCountResponse {
            ok: false,
            count: 0,
            message: format!("measurement_count failed: {err}"),
        },
    }
}

/// Destroys the backing store; the next use rebuilds an empty one.
///
/// # FFI contract
/// - Sync call; blocks until the store executor finished the teardown.
/// - Safe to call repeatedly.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn truncate_database() -> StoreActionResponse {
    let Some(stack) = DATA_STACK.get() else {
        return StoreActionResponse::failure("data stack not configured");
    };
    stack.truncate();
    StoreActionResponse::success("database truncated")
}

/// Returns the backing file size in bytes, 0 when no file exists.
///
/// # FFI contract
/// - Sync call; pure file-system query, resolves no store resource.
/// - Never panics; returns 0 before configuration.
#[flutter_rust_bridge::frb(sync)]
pub fn database_size_bytes() -> u64 {
    DATA_STACK
        .get()
        .map_or(0, |stack| stack.database_size_bytes())
}

/// Returns a lifecycle snapshot of the process-wide data stack.
///
/// # FFI contract
/// - Sync call; reads slot state without resolving anything.
/// - Never panics; all fields are false before configuration.
#[flutter_rust_bridge::frb(sync)]
pub fn stack_status() -> StackStatusResponse {
    let Some(stack) = DATA_STACK.get() else {
        return StackStatusResponse {
            configured: false,
            schema_resolved: false,
            coordinator_resolved: false,
            store_attached: false,
            context_resolved: false,
            database_file_exists: false,
            database_size_bytes: 0,
        };
    };
    let status = stack.status();
    StackStatusResponse {
        configured: true,
        schema_resolved: status.schema_resolved,
        coordinator_resolved: status.coordinator_resolved,
        store_attached: status.store_attached,
        context_resolved: status.context_resolved,
        database_file_exists: status.database_file_exists,
        database_size_bytes: stack.database_size_bytes(),
    }
}
