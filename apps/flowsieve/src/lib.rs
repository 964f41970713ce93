//! # flowsieve
//!
//! HTTP server, worker pool and CLI around `flowsieve-core`.

pub mod api;
pub mod cli;
pub mod config;
pub mod jobs;
pub mod projection;
pub mod worker;
