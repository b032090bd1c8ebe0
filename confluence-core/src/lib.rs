//! Confluence Core — domain types, entry signal, position ledger, bar loop.
//!
//! This crate contains the simulation engine:
//! - Domain types (bars, parameters, positions, trades)
//! - The 2-of-3 RSI / MACD / Bollinger entry vote
//! - Commission-aware cash and position accounting with per-side stacking
//! - The sequential bar loop producing equity, return and trade sequences
//! - The indicator precompute stage that turns raw closes into resolved bars
//!
//! Nothing here performs I/O or holds global state.

pub mod components;
pub mod domain;
pub mod engine;
pub mod indicators;
