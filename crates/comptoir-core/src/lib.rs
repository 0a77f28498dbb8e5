//! Domain model, rendering and configuration for the Comptoir panels.
//!
//! Everything in this crate is free of I/O except the configuration loaders
//! in [`settings`] and [`channels`].

pub mod channels;
pub mod error;
pub mod models;
pub mod render;
pub mod settings;

pub use error::{ComptoirError, Result};
