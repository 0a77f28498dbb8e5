//! Runtime layer for Comptoir.
//!
//! Holds the panel registry, the reconciler that keeps one live panel per
//! scope, the update coordinator, the platform transports, and the HTTP
//! surface.

pub mod coordinator;
pub mod discord;
pub mod memory;
pub mod reconciler;
pub mod registry;
pub mod server;
pub mod transport;

pub use comptoir_core as core;
pub use comptoir_data as data;
