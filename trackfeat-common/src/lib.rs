//! Shared foundation for the trackfeat workspace
//!
//! Holds the error taxonomy, configuration loading, domain types, and the
//! small pure helpers (string normalization, key code mapping) used by the
//! resolution engine and by UI/save layers.

pub mod config;
pub mod error;
pub mod keys;
pub mod normalize;
pub mod types;

pub use error::{Error, Result};
