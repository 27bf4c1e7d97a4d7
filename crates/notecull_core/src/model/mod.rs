//! Domain model for items, predicates and mutation requests.
//!
//! # Responsibility
//! - Define the decrypted item shape the engine works on.
//! - Define caller-built request shapes (filter sets, deletion and wipe requests).
//!
//! # Invariants
//! - Every item is identified by a store-assigned `ItemId`.
//! - Deletion is represented by tombstones, never by hard removal.

pub mod filter;
pub mod item;
pub mod request;
