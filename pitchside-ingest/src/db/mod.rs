//! Persistence layer for the ingestion service

pub mod conflicts;
pub mod dead_letters;
pub mod matches;
pub mod queue;
