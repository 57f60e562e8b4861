//! Data Transfer Objects for inter-service communication
//!
//! DTOs are the wire shapes exchanged with the job sink and, through it, with
//! the production endpoint.

pub mod job;
