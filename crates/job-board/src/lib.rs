//! Job board service: accounts, moderated job postings and application review.

pub mod board;
pub mod config;
pub mod error;
pub mod telemetry;
