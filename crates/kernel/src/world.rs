use mizu_common::{Bounds, ParticleKind, Result};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::collision::{CollisionResolver, Populations, Reaction};
use crate::config::SimConfig;
use crate::factory::ParticleFactory;
use crate::particle::{Particle, ParticleState};

/// Default random source: seedable and serializable, so a captured world
/// continues exactly where it stopped.
pub type SimRng = Xoshiro256PlusPlus;

/// A record of every mutation to the world.
///
/// The log is the input to persistence: a store re-applies it on top of a
/// snapshot. `Reacted` entries are derived from stepping and are kept for
/// inspection only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Populations were (re)built with the given counts.
    Initialized { hydrogen: usize, oxygen: usize },
    /// A prepared particle was appended to its population.
    Inserted { particle: Particle },
    /// A collision rule fired during `tick`.
    Reacted { tick: u64, reaction: Reaction },
    /// The simulation finished advancing to `tick`.
    Stepped { tick: u64 },
}

/// Read-only view of the populations after a step.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub tick: u64,
    pub bounds: Bounds,
    pub hydrogen: &'a [Particle],
    pub oxygen: &'a [Particle],
    pub water: &'a [Particle],
}

impl<'a> Frame<'a> {
    /// All particles, hydrogen first, then oxygen, then water.
    pub fn iter(self) -> impl Iterator<Item = &'a Particle> {
        self.hydrogen
            .iter()
            .chain(self.oxygen.iter())
            .chain(self.water.iter())
    }

    pub fn of(self, kind: ParticleKind) -> &'a [Particle] {
        match kind {
            ParticleKind::Hydrogen => self.hydrogen,
            ParticleKind::Oxygen => self.oxygen,
            ParticleKind::Water => self.water,
        }
    }

    pub fn len(&self) -> usize {
        self.hydrogen.len() + self.oxygen.len() + self.water.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The authoritative simulation state.
///
/// The world exclusively owns the three populations. Hydrogen and oxygen
/// slots are recycled in place, so their counts never change after `init`;
/// droplets are appended on formation and removed once they drain.
///
/// Every random draw goes through `rng`. Two worlds built from the same
/// seed, bounds and config step through bit-identical states.
///
/// Event recording is off by default so a world stepped once per frame
/// keeps a constant footprint; persistence turns it on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World<R = SimRng> {
    factory: ParticleFactory,
    populations: Populations,
    tick: u64,
    rng: R,
    waters_formed: u64,
    waters_drained: u64,
    /// Append-only log of all mutations since the last drain.
    #[serde(skip)]
    event_log: Vec<SimEvent>,
    #[serde(skip)]
    recording: bool,
}

impl World<SimRng> {
    /// Create an empty world driven by a seeded [`SimRng`].
    pub fn with_seed(bounds: Bounds, config: SimConfig, seed: u64) -> Result<Self> {
        Self::new(bounds, config, SimRng::seed_from_u64(seed))
    }
}

impl<R: Rng> World<R> {
    /// Create an empty world at tick 0.
    ///
    /// Errors:
    /// - `Error::InvalidConfig` when `config` fails validation.
    pub fn new(bounds: Bounds, config: SimConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            factory: ParticleFactory::new(bounds, config),
            populations: Populations::default(),
            tick: 0,
            rng,
            waters_formed: 0,
            waters_drained: 0,
            event_log: Vec::new(),
            recording: false,
        })
    }

    /// Fill the hydrogen and oxygen populations at random positions and
    /// clear all droplets. Calling it again replaces whatever was there.
    pub fn init(&mut self, hydrogen: usize, oxygen: usize) -> Result<()> {
        let factory = &self.factory;
        let rng = &mut self.rng;

        let h = (0..hydrogen)
            .map(|_| factory.create(ParticleKind::Hydrogen, None, rng))
            .collect::<Result<Vec<_>>>()?;
        let o = (0..oxygen)
            .map(|_| factory.create(ParticleKind::Oxygen, None, rng))
            .collect::<Result<Vec<_>>>()?;

        self.populations = Populations {
            hydrogen: h,
            oxygen: o,
            water: Vec::new(),
        };
        info!(hydrogen, oxygen, bounds = %factory.bounds(), "world initialized");
        self.record(SimEvent::Initialized { hydrogen, oxygen });
        Ok(())
    }

    /// Append a prepared particle to the population of its kind.
    pub fn insert(&mut self, particle: Particle) {
        if self.recording {
            self.event_log.push(SimEvent::Inserted {
                particle: particle.clone(),
            });
        }
        self.populations.of_mut(particle.kind()).push(particle);
    }

    /// Advance one frame: hydrogen pass, oxygen pass, water pass.
    ///
    /// Errors only if the factory rejects a request, which the fixed pass
    /// rules never trigger.
    pub fn step(&mut self) -> Result<Frame<'_>> {
        self.tick += 1;
        let tick = self.tick;
        let _span = tracing::info_span!("world_step", tick).entered();

        let resolver = CollisionResolver::new(&self.factory);
        let reactions = resolver.resolve(&mut self.populations, &mut self.rng)?;

        for reaction in reactions {
            match reaction {
                Reaction::Bonded { hydrogen, replaced } => {
                    debug!(hydrogen, replaced, "hydrogen bonded");
                }
                Reaction::WaterFormed {
                    oxygen,
                    hydrogen,
                    at,
                } => {
                    self.waters_formed += 1;
                    debug!(oxygen, hydrogen, x = at.x, y = at.y, "water formed");
                }
                Reaction::Drained { index, .. } => {
                    self.waters_drained += 1;
                    trace!(index, "droplet drained");
                }
            }
            self.record(SimEvent::Reacted { tick, reaction });
        }
        self.record(SimEvent::Stepped { tick });

        trace!(
            hydrogen = self.populations.hydrogen.len(),
            merged = self.merged_count(),
            oxygen = self.populations.oxygen.len(),
            water = self.populations.water.len(),
            "step complete"
        );
        Ok(self.frame())
    }

    /// Step until the world reaches `tick`. Does nothing if it is already
    /// there or past it.
    pub fn advance_to(&mut self, tick: u64) -> Result<()> {
        while self.tick < tick {
            self.step()?;
        }
        Ok(())
    }
}

impl<R> World<R> {
    pub fn frame(&self) -> Frame<'_> {
        Frame {
            tick: self.tick,
            bounds: self.factory.bounds(),
            hydrogen: &self.populations.hydrogen,
            oxygen: &self.populations.oxygen,
            water: &self.populations.water,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn bounds(&self) -> Bounds {
        self.factory.bounds()
    }

    pub fn config(&self) -> &SimConfig {
        self.factory.config()
    }

    pub fn factory(&self) -> &ParticleFactory {
        &self.factory
    }

    pub fn populations(&self) -> &Populations {
        &self.populations
    }

    /// Total droplets formed since the world was created.
    pub fn waters_formed(&self) -> u64 {
        self.waters_formed
    }

    /// Total droplets that fell out of the bounds.
    pub fn waters_drained(&self) -> u64 {
        self.waters_drained
    }

    fn merged_count(&self) -> usize {
        self.populations
            .hydrogen
            .iter()
            .filter(|h| h.is_merged())
            .count()
    }

    /// Start or stop appending to the event log. Stopping keeps entries
    /// already recorded until they are drained.
    pub fn record_events(&mut self, enabled: bool) {
        self.recording = enabled;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    fn record(&mut self, event: SimEvent) {
        if self.recording {
            self.event_log.push(event);
        }
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[SimEvent] {
        &self.event_log
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Deterministic FNV-1a hash of tick, counters and every particle.
    ///
    /// The random source is not part of the hash; two worlds with equal
    /// hashes may still diverge if their generators differ.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        mix(&mut h, &self.waters_formed.to_le_bytes());
        mix(&mut h, &self.waters_drained.to_le_bytes());
        for kind in ParticleKind::ALL {
            let population = self.populations.of(kind);
            mix(&mut h, &(population.len() as u64).to_le_bytes());
            for p in population {
                mix(&mut h, &p.position.x.to_le_bytes());
                mix(&mut h, &p.position.y.to_le_bytes());
                mix(&mut h, &p.velocity().x.to_le_bytes());
                mix(&mut h, &p.velocity().y.to_le_bytes());
                mix(&mut h, &p.size().to_le_bytes());
                mix(&mut h, &[state_tag(p.state())]);
            }
        }
        h
    }
}

fn state_tag(state: ParticleState) -> u8 {
    use crate::particle::{HydrogenState, WaterState};
    match state {
        ParticleState::Hydrogen(HydrogenState::Free) => 0,
        ParticleState::Hydrogen(HydrogenState::Merged) => 1,
        ParticleState::Oxygen => 2,
        ParticleState::Water(WaterState::Active) => 3,
        ParticleState::Water(WaterState::Expired) => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use rand::RngCore;

    /// Generator that always yields zero, so every draw is `0.0`.
    #[derive(Debug, Clone)]
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    fn bounds() -> Bounds {
        Bounds::new(1000.0, 1000.0).unwrap()
    }

    fn seeded(seed: u64) -> World {
        let mut w = World::with_seed(bounds(), SimConfig::default(), seed).unwrap();
        w.record_events(true);
        w
    }

    #[test]
    fn world_starts_empty() {
        let w = seeded(0);
        assert_eq!(w.tick(), 0);
        assert!(w.frame().is_empty());
        assert_eq!(w.waters_formed(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = SimConfig {
            scale: 0.0,
            ..SimConfig::default()
        };
        assert!(World::with_seed(bounds(), cfg, 1).is_err());
    }

    #[test]
    fn init_populates_atoms_only() {
        let mut w = seeded(1);
        w.init(12, 5).unwrap();
        let f = w.frame();
        assert_eq!(f.hydrogen.len(), 12);
        assert_eq!(f.oxygen.len(), 5);
        assert!(f.water.is_empty());
        assert!(f.hydrogen.iter().all(|h| !h.is_merged()));
    }

    #[test]
    fn init_replaces_populations() {
        let mut w = seeded(2);
        w.init(10, 10).unwrap();
        w.insert(Particle::new(
            ParticleKind::Water,
            DVec2::new(5.0, 5.0),
            20.0,
        ));
        w.init(3, 1).unwrap();
        let f = w.frame();
        assert_eq!((f.hydrogen.len(), f.oxygen.len(), f.water.len()), (3, 1, 0));
    }

    #[test]
    fn insert_routes_by_kind_and_logs() {
        let mut w = seeded(3);
        let o = Particle::new(ParticleKind::Oxygen, DVec2::ZERO, 18.67);
        w.insert(o.clone());
        assert_eq!(w.frame().oxygen.len(), 1);
        assert_eq!(w.events(), &[SimEvent::Inserted { particle: o }]);
    }

    #[test]
    fn step_increments_tick_and_logs() {
        let mut w = seeded(4);
        w.init(2, 2).unwrap();
        w.drain_events();
        let frame = w.step().unwrap();
        assert_eq!(frame.tick, 1);
        w.step().unwrap();
        assert_eq!(w.tick(), 2);
        assert_eq!(w.events().last(), Some(&SimEvent::Stepped { tick: 2 }));
    }

    #[test]
    fn two_hydrogen_and_oxygen_on_one_spot_form_water() {
        let mut w = seeded(5);
        let at = DVec2::new(400.0, 400.0);
        w.insert(Particle::new(ParticleKind::Hydrogen, at, 17.33));
        w.insert(Particle::new(ParticleKind::Hydrogen, at, 17.33));
        w.insert(Particle::new(ParticleKind::Oxygen, at, 18.67));
        w.drain_events();

        let frame = w.step().unwrap();
        assert_eq!(frame.hydrogen.len(), 2);
        assert_eq!(frame.oxygen.len(), 1);
        assert_eq!(frame.water.len(), 1);

        let reactions: Vec<Reaction> = w
            .events()
            .iter()
            .filter_map(|e| match e {
                SimEvent::Reacted { reaction, .. } => Some(*reaction),
                _ => None,
            })
            .collect();
        assert_eq!(
            reactions[0],
            Reaction::Bonded {
                hydrogen: 0,
                replaced: 1
            }
        );
        assert!(matches!(
            reactions[1],
            Reaction::WaterFormed {
                oxygen: 0,
                hydrogen: 0,
                ..
            }
        ));
        assert_eq!(w.waters_formed(), 1);
    }

    #[test]
    fn droplet_falls_in_the_step_that_formed_it() {
        let mut w = seeded(15);
        let at = DVec2::new(400.0, 400.0);
        w.insert(Particle::new(ParticleKind::Hydrogen, at, 17.33));
        w.insert(Particle::new(ParticleKind::Hydrogen, at, 17.33));
        w.insert(Particle::new(ParticleKind::Oxygen, at, 18.67));
        w.drain_events();
        w.step().unwrap();

        let site = w
            .events()
            .iter()
            .find_map(|e| match e {
                SimEvent::Reacted {
                    reaction: Reaction::WaterFormed { at, .. },
                    ..
                } => Some(*at),
                _ => None,
            })
            .unwrap();
        let droplet = &w.frame().water[0];
        assert_eq!(
            droplet.position.y,
            site.y + droplet.size() * w.config().fall_rate
        );
        assert_ne!(droplet.position.x, site.x);
    }

    #[test]
    fn log_stays_empty_unless_recording() {
        let mut w = World::with_seed(
            Bounds::new(800.0, 600.0).unwrap(),
            SimConfig::default(),
            77,
        )
        .unwrap();
        assert!(!w.is_recording());
        w.init(60, 30).unwrap();
        w.advance_to(5_000).unwrap();
        assert!(w.events().is_empty());
        assert!(w.waters_formed() > 0);
    }

    #[test]
    fn recording_can_be_paused() {
        let mut w = seeded(16);
        w.init(3, 1).unwrap();
        w.step().unwrap();
        let recorded = w.events().len();
        assert!(recorded >= 2);

        w.record_events(false);
        w.advance_to(50).unwrap();
        w.insert(Particle::new(ParticleKind::Oxygen, DVec2::ZERO, 18.67));
        assert_eq!(w.events().len(), recorded);
    }

    #[test]
    fn droplet_drains_in_the_step_it_crosses() {
        let mut w = seeded(6);
        w.insert(Particle::new(
            ParticleKind::Water,
            DVec2::new(10.0, 999.0),
            20.0,
        ));
        let frame = w.step().unwrap();
        assert!(frame.water.is_empty());
        assert_eq!(w.waters_drained(), 1);
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let mut a = seeded(42);
        let mut b = seeded(42);
        a.init(40, 20).unwrap();
        b.init(40, 20).unwrap();
        for _ in 0..300 {
            let fa: Vec<DVec2> = a.step().unwrap().iter().map(|p| p.position).collect();
            let fb: Vec<DVec2> = b.step().unwrap().iter().map(|p| p.position).collect();
            assert_eq!(fa, fb);
        }
        assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = seeded(1);
        let mut b = seeded(2);
        a.init(5, 5).unwrap();
        b.init(5, 5).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn custom_rng_drives_every_draw() {
        let mut w = World::new(bounds(), SimConfig::default(), ZeroRng).unwrap();
        w.insert(Particle::new(
            ParticleKind::Oxygen,
            DVec2::new(100.0, 100.0),
            18.67,
        ));
        w.insert(Particle::new(
            ParticleKind::Water,
            DVec2::new(0.0, 10.0),
            20.0,
        ));

        w.step().unwrap();
        let f = w.frame();
        // Zero angle: the impulse points along +x.
        assert!((f.oxygen[0].position.x - 100.075).abs() < 1e-9);
        assert_eq!(f.oxygen[0].position.y, 100.0);
        assert_eq!(f.water[0].position.x, (10.0f64 / 100.0).cos());
        assert_eq!(f.water[0].position.y, 12.0);

        w.step().unwrap();
        assert!((w.frame().oxygen[0].position.x - 100.225).abs() < 1e-9);
    }

    #[test]
    fn init_with_zero_rng_places_at_origin() {
        let mut w = World::new(bounds(), SimConfig::default(), ZeroRng).unwrap();
        w.init(2, 1).unwrap();
        assert!(w.frame().iter().all(|p| p.position == DVec2::ZERO));
    }

    #[test]
    fn advance_to_reaches_target_tick() {
        let mut w = seeded(7);
        w.init(4, 2).unwrap();
        w.advance_to(25).unwrap();
        assert_eq!(w.tick(), 25);
        w.advance_to(10).unwrap();
        assert_eq!(w.tick(), 25);
    }

    #[test]
    fn drain_events_clears_log() {
        let mut w = seeded(8);
        w.init(1, 1).unwrap();
        let events = w.drain_events();
        assert_eq!(
            events,
            vec![SimEvent::Initialized {
                hydrogen: 1,
                oxygen: 1
            }]
        );
        assert!(w.events().is_empty());
    }

    #[test]
    fn serde_keeps_rng_position() {
        let mut w = seeded(9);
        w.init(10, 4).unwrap();
        w.advance_to(5).unwrap();
        let json = serde_json::to_string(&w).unwrap();
        let back: World = serde_json::from_str(&json).unwrap();
        assert!(back.events().is_empty());
        assert_eq!(back.tick(), 5);
        assert_eq!(back.rng, w.rng);
        assert_eq!(back.populations().hydrogen.len(), 10);
    }
}
