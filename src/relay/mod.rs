//! IDMT overcurrent relay model.
//!
//! This module contains the IEC curve table and the settings engine that
//! derives pickup current and time multiplier from operating conditions.

pub mod curves;
pub mod settings;

pub use curves::*;
pub use settings::*;
