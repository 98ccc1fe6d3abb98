//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep boundary/CLI layers decoupled from storage details.

pub mod assignment_service;
pub mod dataset_service;
pub mod reconciler;
