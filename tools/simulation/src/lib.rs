//! Simulation & Liquidity Testing Framework
//!
//! Drives the order keeper the way a host chain would: seeded bots produce
//! order flow, a miniature chain executes it block by block, journals it and
//! snapshots at breathe blocks, and scenarios check the keeper's guarantees
//! under stress.
//!
//! # Modules
//! - `bots`: Market maker and retail trader bots
//! - `flow`: Seeded multi-market order flow
//! - `chain`: Block production, journaling and breathe-block snapshots
//! - `scenarios`: Flood, volatility and expiry scenarios
//! - `metrics`: Per-block counters and latency histograms
//! - `replay`: Crash recovery and replay validation
//! - `export`: Metrics and scenario JSON export

pub mod bots;
pub mod chain;
pub mod export;
pub mod flow;
pub mod metrics;
pub mod replay;
pub mod scenarios;

/// Crate version constant
pub const VERSION: &str = "1.0.0";
