//! Durable storage for Comptoir.
//!
//! Responsible for the gauge snapshot file (schema completion and corruption
//! recovery included) and for the optional file of panel message ids.

pub mod panels;
pub mod store;

pub use comptoir_core as core;
