//! Core library modules for nvdb-mapper
//!
//! Pure mapping logic lives in `position`, `segment`, `index`, `mapper` and
//! `query`; everything that talks to a network goes through the traits in `fetch`.

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod job;
pub mod mapper;
pub mod options;
pub mod position;
pub mod query;
pub mod route;
pub mod segment;
pub mod thematic;

// Re-export main types for internal use
pub use client::{NvdbClient, RouteClient};
pub use job::MappingJob;
