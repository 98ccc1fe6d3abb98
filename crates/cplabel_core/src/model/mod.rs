//! Domain model for datasets, change-point marks, evaluations and assignments.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own per-record validation rules shared by services and repositories.
//!
//! # Invariants
//! - Datasets are immutable after ingestion except for `status`.
//! - An evaluation never carries change points and the "no change points"
//!   declaration at the same time.

pub mod annotation;
pub mod assignment;
pub mod dataset;
pub mod evaluation;
