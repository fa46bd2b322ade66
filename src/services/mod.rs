//! External service integrations and workflow services

pub mod generator;
pub mod plex;
pub mod rate_limiter;

pub use generator::{
    GenerationError, GenerationReport, GenerationRequest, GeneratorService, PruneReport,
};
pub use plex::{PlexClient, ServerStatus};
