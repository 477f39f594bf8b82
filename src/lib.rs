//! Course-completion CSV pipeline: validates and deduplicates course
//! records, then writes per-course, per-user and per-result JSON views.

pub mod config;
pub mod dedup;
pub mod error;
pub mod intake;
pub mod models;
pub mod orchestrator;
pub mod summary;
pub mod validate;
pub mod writer;
