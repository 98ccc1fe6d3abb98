//! Interactive change-point annotation.
//!
//! # Responsibility
//! - Hold the reviewer's working set of marks as an explicit state value.
//! - Drive that state from discrete input events (click, type choice, list
//!   removal) and publish every change to subscribed observers.
//!
//! # Invariants
//! - `no_change_points == true` implies no marks and no pending selection.
//! - Marks are keyed by absolute sample index, so paging never moves them.
//! - A pending selection never creates a mark until a type is committed.

mod session;
mod state;

pub use session::{AnnotationObserver, AnnotationSession, ClickOutcome, SubscriptionId};
pub use state::{AnnotationState, StateError};
