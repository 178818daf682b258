//! Domain model shared by capture, persistence and the FFI surface.
//!
//! # Responsibility
//! - Define the canonical measurement record and its vocabulary enums.
//!
//! # Invariants
//! - Model types stay storage-agnostic; SQL mapping lives in `store`.
//!
//! # See also
//! - docs/architecture/data-stack.md

pub mod measurement;
