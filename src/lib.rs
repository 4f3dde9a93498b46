//! Bowler & A3 Toolkit
//!
//! Track monthly performance metrics on bowler scorecards, compute their
//! statistics and process capability, and work problems through A3 cases
//! with chat-assisted 5-Whys trees and action plans. Records live in a
//! key-value store (SQLite on disk) under per-user namespaces.

pub mod ai;
pub mod cli;
pub mod core;
pub mod entities;
pub mod service;
pub mod store;
pub mod yaml;
