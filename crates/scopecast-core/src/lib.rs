//! # scopecast-core
//!
//! Core crate for scopecast. Contains the configuration schemas and the
//! unified error system shared by the realtime engine and the agent binary.
//!
//! This crate has **no** internal dependencies on other scopecast crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
