//! Job application tracking: reconciles backend rows with in-memory job listings and wires
//! the job search, profile and mock interview services around them.

pub mod backend;
pub mod config;
pub mod error;
pub mod interview;
pub mod profile;
pub mod search;
pub mod telemetry;
pub mod tracker;
