//! Core domain types
//!
//! A graph job is identified by nothing more than the time range it covers.
//! These types hold the rules that turn a requested range into a stable job
//! identity and validate jobs before any work is done for them.

pub mod job;
pub mod range;
