//! Memory store over dynamically named collections.
//!
//! Routes store/find/delete/info to the resolved collection, creating it on
//! first reference with the active embedding provider's dimensionality.

mod collections;
mod crud;
mod search;

// pub(crate): module internals hidden; public items re-exported explicitly via lib.rs
pub(crate) mod store;

pub use search::FindOptions;
pub use store::{MemoryStore, StoreSettings};

#[cfg(test)]
mod tests;
