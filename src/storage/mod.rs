//! Configuration storage and persistence module.
//!
//! Handles saving and loading the application config to/from disk.

pub mod app_config;

pub use app_config::*;
