//! Rekordbox library deduplicator - shared modules for all binaries.

pub mod config;
pub mod criteria;
pub mod dump;
pub mod grouping;
pub mod locations;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod playlist;
pub mod progress;
pub mod prompt;
pub mod relocate;
pub mod remap;
pub mod safety;
pub mod store;
