//! Mizu kernel: particle state, collision rules and deterministic frame stepping.
//!
//! # Invariants
//! - Hydrogen and oxygen counts never change after `World::init`; consumed
//!   atoms are replaced in their own slot.
//! - Droplets are only added by water formation and only removed by draining.
//! - A merged hydrogen never becomes free again.
//! - All randomness flows through the world's generator, so a seed fully
//!   determines the run.

pub mod collision;
pub mod config;
pub mod factory;
pub mod particle;
pub mod world;

pub use collision::{CollisionResolver, Populations, Reaction};
pub use config::SimConfig;
pub use factory::ParticleFactory;
pub use particle::{HydrogenState, Particle, ParticleState, WaterState};
pub use world::{Frame, SimEvent, SimRng, World};
