use glam::DVec2;
use mizu_common::ParticleKind;
use mizu_kernel::{Particle, ParticleState, World};
use std::fmt;

/// Population inspector for developer tooling.
///
/// Read-only queries against a world for debugging and CLI output.
pub struct PopulationInspector;

impl PopulationInspector {
    /// Produce a summary of the populations and lifetime counters.
    pub fn summary<R>(world: &World<R>) -> PopulationSummary {
        let frame = world.frame();
        let merged = frame.hydrogen.iter().filter(|h| h.is_merged()).count();
        PopulationSummary {
            tick: world.tick(),
            hydrogen_free: frame.hydrogen.len() - merged,
            hydrogen_merged: merged,
            oxygen: frame.oxygen.len(),
            water: frame.water.len(),
            waters_formed: world.waters_formed(),
            waters_drained: world.waters_drained(),
            pending_events: world.events().len(),
            state_hash: world.state_hash(),
        }
    }

    /// Details of the particle in slot `index` of the `kind` population.
    pub fn inspect_particle<R>(
        world: &World<R>,
        kind: ParticleKind,
        index: usize,
    ) -> Option<ParticleInfo> {
        world
            .frame()
            .of(kind)
            .get(index)
            .map(|p| ParticleInfo::new(index, p))
    }

    /// Every particle of one population, in slot order.
    pub fn list_population<R>(world: &World<R>, kind: ParticleKind) -> Vec<ParticleInfo> {
        world
            .frame()
            .of(kind)
            .iter()
            .enumerate()
            .map(|(i, p)| ParticleInfo::new(i, p))
            .collect()
    }

    /// The particle of `kind` whose centre is closest to `point`.
    pub fn nearest<R>(world: &World<R>, kind: ParticleKind, point: DVec2) -> Option<ParticleInfo> {
        world
            .frame()
            .of(kind)
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.position
                    .distance_squared(point)
                    .total_cmp(&b.position.distance_squared(point))
            })
            .map(|(i, p)| ParticleInfo::new(i, p))
    }
}

/// Summary of the simulation for the inspector.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSummary {
    pub tick: u64,
    pub hydrogen_free: usize,
    pub hydrogen_merged: usize,
    pub oxygen: usize,
    pub water: usize,
    pub waters_formed: u64,
    pub waters_drained: u64,
    pub pending_events: usize,
    pub state_hash: u64,
}

impl fmt::Display for PopulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sim: tick={} H={} (H2={}) O={} H2O={} formed={} drained={} pending_events={} hash={:016x}",
            self.tick,
            self.hydrogen_free,
            self.hydrogen_merged,
            self.oxygen,
            self.water,
            self.waters_formed,
            self.waters_drained,
            self.pending_events,
            self.state_hash,
        )
    }
}

/// Detailed info about a single particle.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleInfo {
    pub index: usize,
    pub label: &'static str,
    pub state: ParticleState,
    pub position: DVec2,
    pub velocity: DVec2,
    pub size: f64,
}

impl ParticleInfo {
    fn new(index: usize, p: &Particle) -> Self {
        Self {
            index,
            label: p.label(),
            state: p.state(),
            position: p.position,
            velocity: p.velocity(),
            size: p.size(),
        }
    }
}

impl fmt::Display for ParticleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] pos=({:.2}, {:.2}) vel=({:.3}, {:.3}) size={:.2} state={:?}",
            self.label,
            self.index,
            self.position.x,
            self.position.y,
            self.velocity.x,
            self.velocity.y,
            self.size,
            self.state,
        )
    }
}
