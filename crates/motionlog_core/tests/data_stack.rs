use motionlog_core::{
    BodyPart, BodySide, DataStack, DataStackConfig, Measurement, MeasurementKind, SerialExecutor,
    StoreError, MEASUREMENT_SCHEMA,
};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

#[test]
fn truncate_roundtrip_recreates_an_empty_store() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let context = stack.context();
    context.insert(sample(1.0));
    assert_eq!(
        context.measurement_count().unwrap(),
        0,
        "pending records must stay invisible to queries"
    );

    context.save().unwrap();
    assert_eq!(context.measurement_count().unwrap(), 1);

    stack.truncate();

    let context = stack.context();
    assert_eq!(context.measurement_count().unwrap(), 0);

    context.insert(sample(2.0));
    context.save().unwrap();
    assert_eq!(context.measurement_count().unwrap(), 1);
}

#[test]
fn database_size_is_zero_until_a_store_exists() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    assert_eq!(stack.database_size_bytes(), 0, "construction performs no I/O");

    let context = stack.context();
    context.insert(sample(1.0));
    context.save().unwrap();
    assert!(stack.database_size_bytes() > 0);

    stack.truncate();
    assert_eq!(stack.database_size_bytes(), 0);
}

#[test]
fn truncate_is_idempotent_and_leaves_the_chain_torn_down() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let context = stack.context();
    context.insert(sample(1.0));
    context.save().unwrap();

    stack.truncate();
    stack.truncate();

    let status = stack.status();
    assert!(!status.coordinator_resolved);
    assert!(!status.context_resolved);
    assert!(!status.store_attached);
    assert!(!status.database_file_exists);
}

#[test]
fn truncate_discards_pending_work_before_deleting_the_file() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let context = stack.context();
    context.insert(sample(1.0));
    context.insert(sample(2.0));
    assert_eq!(context.pending_count(), 2);

    stack.truncate();

    assert!(!context.has_pending_changes());
    assert_eq!(stack.context().measurement_count().unwrap(), 0);
}

#[test]
fn schema_survives_truncate_while_the_store_rebuilds() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let schema = stack.schema();
    assert_eq!(schema.name(), MEASUREMENT_SCHEMA);
    stack.context();

    stack.truncate();

    let status = stack.status();
    assert!(status.schema_resolved, "the schema slot is deliberately retained");
    assert!(!status.coordinator_resolved);
    assert!(!status.context_resolved);

    // The rebuilt chain reuses the retained schema.
    assert_eq!(stack.context().measurement_count().unwrap(), 0);
    assert!(stack.status().store_attached);
}

#[test]
fn resolving_the_coordinator_attaches_without_a_context() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let coordinator = stack.coordinator();
    assert!(coordinator.is_attached());

    let status = stack.status();
    assert!(
        status.schema_resolved,
        "the coordinator factory resolves its upstream schema"
    );
    assert!(status.coordinator_resolved);
    assert!(status.store_attached);
    assert!(!status.context_resolved, "no context is created on this path");
    assert!(status.database_file_exists);
}

#[test]
fn stale_context_handles_fail_after_truncate() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let old_context = stack.context();
    old_context.insert(sample(1.0));
    old_context.save().unwrap();

    stack.truncate();

    // The pre-truncate handle is detached, not silently writing into a
    // recreated file.
    let err = old_context.measurement_count().unwrap_err();
    assert!(matches!(err, StoreError::StoreDetached));

    assert_eq!(stack.context().measurement_count().unwrap(), 0);
}

#[test]
fn context_handles_share_one_pending_buffer_across_threads() {
    let dir = TempDir::new().unwrap();
    let stack = Arc::new(test_stack(&dir));

    let writer = {
        let stack = stack.clone();
        thread::spawn(move || stack.context().insert(sample(1.0)))
    };
    writer.join().unwrap();

    let context = stack.context();
    assert!(context.has_pending_changes());
    assert_eq!(context.pending_count(), 1);

    context.insert(sample(2.0));
    assert_eq!(context.save().unwrap(), 2);
    assert_eq!(context.measurement_count().unwrap(), 2);
}

#[test]
fn rollback_discards_pending_work() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let context = stack.context();
    context.insert(sample(1.0));
    context.insert(sample(2.0));
    context.rollback();

    assert!(!context.has_pending_changes());
    assert_eq!(context.save().unwrap(), 0);
    assert_eq!(context.measurement_count().unwrap(), 0);
}

#[test]
fn save_validates_before_touching_the_store() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let context = stack.context();
    context.insert(Measurement::new(
        MeasurementKind::Gyroscope,
        f64::NAN,
        0.0,
        0.0,
        0.0,
    ));

    let err = context.save().unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(context.measurement_count().unwrap(), 0, "nothing may be written");
    assert_eq!(context.pending_count(), 1, "a failed save keeps the buffer");

    context.rollback();
    assert_eq!(context.save().unwrap(), 0);
}

#[test]
fn fetch_recent_returns_committed_rows_newest_first() {
    let dir = TempDir::new().unwrap();
    let stack = test_stack(&dir);

    let context = stack.context();
    context.insert(sample(1.0));
    context.insert(sample(3.0));
    context.insert(sample(2.0));

    let mut attitude = Measurement::attitude(4.0, 0.1, 0.2, 0.3, 0.9);
    attitude.place(BodySide::Left, BodyPart::Wrist);
    context.insert(attitude.clone());
    context.save().unwrap();

    let recent = context.fetch_recent(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].timestamp, 4.0);
    assert_eq!(recent[1].timestamp, 3.0);

    let loaded = &recent[0];
    assert_eq!(loaded.id, attitude.id);
    assert_eq!(loaded.kind, MeasurementKind::Attitude);
    assert_eq!(loaded.w, Some(0.9));
    assert_eq!(loaded.body_side, BodySide::Left);
    assert_eq!(loaded.body_part, BodyPart::Wrist);
    assert!(loaded.is_local);
}

fn test_stack(dir: &TempDir) -> DataStack {
    let executor = Arc::new(SerialExecutor::spawn("stack-test").unwrap());
    let config = DataStackConfig::new(MEASUREMENT_SCHEMA, "motion_test.sqlite3", dir.path());
    DataStack::new(config, executor)
}

fn sample(timestamp: f64) -> Measurement {
    Measurement::new(MeasurementKind::Accelerometer, timestamp, 0.01, -0.02, 0.98)
}
