//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `motionlog_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use motionlog_core::{SchemaModel, MEASUREMENT_SCHEMA};

fn main() {
    println!("motionlog_core ping={}", motionlog_core::ping());
    println!("motionlog_core version={}", motionlog_core::core_version());
    match SchemaModel::load(None, MEASUREMENT_SCHEMA) {
        Ok(schema) => println!(
            "schema {} bundle={} latest_version={}",
            schema.name(),
            schema.bundle(),
            schema.latest_version()
        ),
        Err(err) => println!("schema load failed: {err}"),
    }
}
