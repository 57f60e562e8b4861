//! Flowgraph Core
//!
//! Core types shared by the flowgraph service and its HTTP clients.
//!
//! This crate contains:
//! - Domain types: time ranges, deterministic job ids and job descriptors
//! - DTOs: the JSON payload carried from the job sink to the production endpoint

pub mod domain;
pub mod dto;

pub use domain::job::{JobDescriptor, JobId, compute_id};
pub use domain::range::TimeRange;
