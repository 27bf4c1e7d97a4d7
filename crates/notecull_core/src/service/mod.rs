//! Engine use-case services.
//!
//! # Responsibility
//! - Compose the predicate model with Item Store calls.
//! - Keep callers (CLI, embedding apps) independent of store details.

pub mod mutation_service;
pub mod query_service;
