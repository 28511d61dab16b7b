use glam::DVec2;
use mizu_common::{Bounds, Error, ParticleKind, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::particle::Particle;

/// Builds particles for a fixed simulation area.
///
/// All randomness (placement, droplet size) is drawn from the caller's
/// source so a seeded world stays reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleFactory {
    bounds: Bounds,
    config: SimConfig,
}

impl ParticleFactory {
    pub fn new(bounds: Bounds, config: SimConfig) -> Self {
        Self { bounds, config }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Create a particle of `kind`.
    ///
    /// Atoms without a position are placed uniformly at random inside the
    /// bounds. Water must be given its creation site.
    ///
    /// Errors:
    /// - `Error::MissingPosition` for water without a position.
    pub fn create<R: Rng>(
        &self,
        kind: ParticleKind,
        position: Option<DVec2>,
        rng: &mut R,
    ) -> Result<Particle> {
        let Some(size) = self.config.atom_size(kind) else {
            let site = position.ok_or(Error::MissingPosition(kind))?;
            return Ok(self.droplet(site, rng));
        };
        let position = match position {
            Some(p) => p,
            None => self.random_position(rng),
        };
        Ok(Particle::new(kind, position, size))
    }

    /// Create a particle from its kind name (`H`, `O`, `H2O`).
    ///
    /// Errors:
    /// - `Error::InvalidKind` for any other name.
    pub fn create_named<R: Rng>(
        &self,
        name: &str,
        position: Option<DVec2>,
        rng: &mut R,
    ) -> Result<Particle> {
        let kind: ParticleKind = name.parse()?;
        self.create(kind, position, rng)
    }

    fn droplet<R: Rng>(&self, site: DVec2, rng: &mut R) -> Particle {
        let cfg = &self.config;
        let size = (rng.random::<f64>() * cfg.droplet_spread + cfg.droplet_base) * cfg.scale;
        Particle::new(ParticleKind::Water, site, size)
    }

    fn random_position<R: Rng>(&self, rng: &mut R) -> DVec2 {
        let x = self.bounds.width() * rng.random::<f64>();
        let y = self.bounds.height() * rng.random::<f64>();
        DVec2::new(x, y)
    }
}
