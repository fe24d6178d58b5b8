//! Use-case services over the record store.
//!
//! # Responsibility
//! - `reconcile`: apply a mark batch atomically with upsert-per-row semantics.
//! - `gateway`: validate caller requests and shape JSON responses.

pub mod gateway;
pub mod reconcile;
