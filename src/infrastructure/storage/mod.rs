//! Storage adapters for Semantic MDM.
//!
//! Terms live in static JSON files, one per domain; nothing is written back.

pub mod json_store;

pub use json_store::JsonTermStore;
