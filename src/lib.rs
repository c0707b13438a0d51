//! b3futures - B3 futures settlement price archive
//!
//! This library collects the daily settlement prices B3 publishes for listed
//! futures into an append-only SQLite store, and provides read-only queries
//! and interactive charts over that archive.

pub mod analysis;
pub mod analytics;
pub mod charts;
pub mod cli;
pub mod collector;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod query;
pub mod scraping;
pub mod sync;
pub mod utils;
