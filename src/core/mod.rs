//! Core infrastructure — shared foundation used across the whole crate.
//!
//! - **config** — configuration loading and resolved types.
//! - **error** — process-level error enum.

pub mod config;
pub mod error;
