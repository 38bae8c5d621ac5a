//! Core types, config, and errors for Shark County.

pub mod busy;
pub mod config;
pub mod error;
pub mod types;
