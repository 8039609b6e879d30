//! # MOTX Common Library
//!
//! Shared code for the MOTX crates:
//! - Error type
//! - Configuration file resolution and TOML loading
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
