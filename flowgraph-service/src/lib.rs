//! Graph job coordination service
//!
//! Accepts graph requests over HTTP, queues them for production, produces
//! graphs from flow log digests when jobs are delivered back, and serves
//! finished graphs.

pub mod api;
pub mod app;
pub mod config;
pub mod convert;
pub mod db;
pub mod repository;
pub mod service;

#[cfg(test)]
mod testing;
