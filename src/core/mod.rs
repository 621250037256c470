//! Core error and configuration types.

pub mod error;
pub mod settings;
