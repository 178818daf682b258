//! Core data-access layer for MotionLog.
//! This crate is the single source of truth for store lifecycle invariants.

pub mod exec;
pub mod lazy;
pub mod logging;
pub mod model;
pub mod store;

pub use exec::{Executor, ExecutorExt, SerialExecutor, Task};
pub use lazy::LazySlot;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::measurement::{
    BodyPart, BodySide, Measurement, MeasurementId, MeasurementKind, MeasurementValidationError,
};
pub use store::{
    AttachOptions, DataContext, DataStack, DataStackConfig, SchemaModel, StackStatus,
    StoreCoordinator, StoreError, StoreResult, MEASUREMENT_SCHEMA,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
