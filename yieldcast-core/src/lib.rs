//! Core types and pipeline for the yieldcast residential solar estimator.

/// Expiring single-flight cache used by the resolvers.
pub mod cache;
/// Cached irradiance climatology.
pub mod climate;
/// Runtime settings.
pub mod config;
/// Error taxonomy of the pipeline.
pub mod error;
/// Postcode normalization and resolution.
pub mod location;
/// Domain models shared by all crates.
pub mod model;
/// Traits describing the upstream interfaces.
pub mod ports;
/// Audit records for finished calculations.
pub mod record;
/// High-level service facade used by clients.
pub mod service;
/// Photovoltaic yield model.
pub mod solar;
/// Wiring of upstream adapters into cached components.
pub mod sources;

pub use cache::*;
pub use climate::*;
pub use config::*;
pub use error::*;
pub use location::*;
pub use model::*;
pub use ports::*;
pub use record::*;
pub use service::*;
pub use solar::*;
pub use sources::*;
