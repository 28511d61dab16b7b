//! Developer tooling: read-only inspection of a running simulation.
//!
//! # Invariants
//! - Tools never mutate the world.

mod inspector;

pub use inspector::{ParticleInfo, PopulationInspector, PopulationSummary};
