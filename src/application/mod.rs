//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Commands go through the membership aggregate's named transitions; queries
//! read through the repositories.

pub mod handlers;
