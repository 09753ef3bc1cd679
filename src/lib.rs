//! BOOKIE — Point-Wager Settlement Engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod store;
pub mod oracle;
pub mod engine;
pub mod ops;
