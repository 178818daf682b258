//! Flutter-facing FFI crate for the MotionLog core.
//! Exposes the measurement data stack to Dart through FRB.

pub mod api;
