use glam::DVec2;
use mizu_common::{Bounds, ParticleKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::config::SimConfig;

/// Bonding state of a hydrogen atom. `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HydrogenState {
    Free,
    Merged,
}

/// Lifecycle of a water droplet. `Expired` droplets are culled in the same pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterState {
    Active,
    Expired,
}

/// Kind-tagged state. The particle kind is derived from the variant, so a
/// kind can never carry another kind's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleState {
    Hydrogen(HydrogenState),
    Oxygen,
    Water(WaterState),
}

impl ParticleState {
    /// State a freshly created particle of `kind` starts in.
    pub fn initial(kind: ParticleKind) -> Self {
        match kind {
            ParticleKind::Hydrogen => Self::Hydrogen(HydrogenState::Free),
            ParticleKind::Oxygen => Self::Oxygen,
            ParticleKind::Water => Self::Water(WaterState::Active),
        }
    }

    pub fn kind(self) -> ParticleKind {
        match self {
            Self::Hydrogen(_) => ParticleKind::Hydrogen,
            Self::Oxygen => ParticleKind::Oxygen,
            Self::Water(_) => ParticleKind::Water,
        }
    }
}

/// A moving, collidable simulation entity.
///
/// `position` is the hit-test centre and also the top-left corner renderers
/// draw the sprite from. Droplets never use `velocity`; their motion is a
/// pure function of position, size and the random source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: DVec2,
    velocity: DVec2,
    size: f64,
    state: ParticleState,
}

impl Particle {
    /// Build a particle at rest in the initial state of `kind`.
    pub fn new(kind: ParticleKind, position: DVec2, size: f64) -> Self {
        Self {
            position,
            velocity: DVec2::ZERO,
            size,
            state: ParticleState::initial(kind),
        }
    }

    pub fn kind(&self) -> ParticleKind {
        self.state.kind()
    }

    pub fn state(&self) -> ParticleState {
        self.state
    }

    pub fn velocity(&self) -> DVec2 {
        self.velocity
    }

    /// Sprite extent; width and height are equal.
    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn radius(&self) -> f64 {
        self.size / 2.0
    }

    pub fn set_position(&mut self, position: DVec2) {
        self.position = position;
    }

    pub fn is_merged(&self) -> bool {
        self.state == ParticleState::Hydrogen(HydrogenState::Merged)
    }

    pub fn is_expired(&self) -> bool {
        self.state == ParticleState::Water(WaterState::Expired)
    }

    /// Display label: `H`, `H2` once merged, `O`, `H2O`.
    pub fn label(&self) -> &'static str {
        match self.state {
            ParticleState::Hydrogen(HydrogenState::Free) => "H",
            ParticleState::Hydrogen(HydrogenState::Merged) => "H2",
            ParticleState::Oxygen => "O",
            ParticleState::Water(_) => "H2O",
        }
    }

    /// Transition a free hydrogen to `Merged` and grow it to the "H2" size.
    ///
    /// Returns whether a transition happened; calling it on a merged hydrogen
    /// or on any other kind changes nothing.
    pub fn mark_merged(&mut self, config: &SimConfig) -> bool {
        if self.state != ParticleState::Hydrogen(HydrogenState::Free) {
            return false;
        }
        self.state = ParticleState::Hydrogen(HydrogenState::Merged);
        self.size = config.merged_size();
        true
    }

    /// Collision test gated by state: free H against free H, and O against
    /// merged H. Every other pairing never collides.
    pub fn is_hit(&self, other: &Particle) -> bool {
        use HydrogenState::{Free, Merged};
        let eligible = matches!(
            (self.state, other.state),
            (
                ParticleState::Hydrogen(Free),
                ParticleState::Hydrogen(Free)
            ) | (ParticleState::Oxygen, ParticleState::Hydrogen(Merged))
        );
        eligible && self.overlaps(other)
    }

    /// Pure geometric overlap: centre distance strictly below the radius sum.
    pub fn overlaps(&self, other: &Particle) -> bool {
        self.position.distance(other.position) < self.radius() + other.radius()
    }

    /// Advance one tick. Atoms take a Brownian step and wrap around the
    /// bounds; droplets sway downwards and expire once they reach the bottom.
    pub fn update_position<R: Rng>(&mut self, rng: &mut R, bounds: &Bounds, config: &SimConfig) {
        match self.state {
            ParticleState::Hydrogen(_) | ParticleState::Oxygen => {
                self.drift(rng, config);
                self.wrap(bounds);
            }
            ParticleState::Water(_) => self.fall(rng, bounds, config),
        }
    }

    fn drift<R: Rng>(&mut self, rng: &mut R, config: &SimConfig) {
        let angle = TAU * rng.random::<f64>();
        self.velocity += config.impulse * DVec2::new(angle.cos(), angle.sin());

        let speed = self.velocity.length();
        if speed > config.max_speed {
            self.velocity = self.velocity / speed * config.max_speed;
        }
        self.position += self.velocity;
    }

    // A particle must leave the area by half its size before it reappears on
    // the opposite edge. Checks run x then y, far edge before near edge.
    fn wrap(&mut self, bounds: &Bounds) {
        let half = self.size / 2.0;
        let p = &mut self.position;

        if p.x > bounds.width() + half {
            p.x = -half;
        }
        if p.x + self.size < 0.0 {
            p.x = bounds.width() + half;
        }
        if p.y > bounds.height() + half {
            p.y = -half;
        }
        if p.y + self.size < 0.0 {
            p.y = bounds.height() + half;
        }
    }

    fn fall<R: Rng>(&mut self, rng: &mut R, bounds: &Bounds, config: &SimConfig) {
        let noise = rng.random::<f64>() * config.drift_noise;
        self.position.x += ((self.position.y + noise) / config.drift_period).cos();
        self.position.y += self.size * config.fall_rate;

        if self.position.y >= bounds.height() {
            self.state = ParticleState::Water(WaterState::Expired);
        }
    }
}
