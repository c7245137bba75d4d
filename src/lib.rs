//! Chore Ledger Library
//!
//! Task templates, the instance generator, the task lifecycle state machine
//! and the daily refresh scheduler, over a SQLite store.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod generator;
pub mod lifecycle;
pub mod logging;
pub mod scheduler;
pub mod timestamp;
pub mod types;
