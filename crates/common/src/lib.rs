//! Shared value types for the mizu workspace: simulation bounds, particle
//! kinds and the crate-wide error type.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Bounds, ParticleKind};
