//! # Finca Common Library
//!
//! Shared code for the finca progress services:
//! - Error and result types
//! - TOML configuration model and loading
//! - Configuration file resolution
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
