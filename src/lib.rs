//! GOLDNAV: live fair-value tracker for a gold ETF.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod feeds;
pub mod engine;
pub mod display;
pub mod dashboard;
