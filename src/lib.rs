//! Polar Core Library
//!
//! Task lifecycle and recurrence-scheduling engine: trash and restore, recurring
//! task reconciliation, trigger scheduling, and filtered task views.

pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod reconciler;
pub mod recurrence;
pub mod triggers;
pub mod types;
pub mod views;
