//! Shared types and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - The authenticated `Principal` value
//! - Cent tolerance helpers for decimal money
//! - Configuration management

pub mod config;
pub mod types;

pub use config::AppConfig;
