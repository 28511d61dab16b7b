use glam::DVec2;
use mizu_common::{ParticleKind, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::factory::ParticleFactory;
use crate::particle::Particle;

/// Outcome of one collision rule firing during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reaction {
    /// Hydrogen at `hydrogen` merged; the slot `replaced` got a fresh atom.
    Bonded { hydrogen: usize, replaced: usize },
    /// Oxygen at `oxygen` consumed the merged hydrogen at `hydrogen` and a
    /// droplet was appended at `at`.
    WaterFormed {
        oxygen: usize,
        hydrogen: usize,
        at: DVec2,
    },
    /// Droplet that fell past the bottom edge was removed from `index`.
    Drained { index: usize, at: DVec2 },
}

/// The three populations a world owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Populations {
    pub hydrogen: Vec<Particle>,
    pub oxygen: Vec<Particle>,
    pub water: Vec<Particle>,
}

impl Populations {
    pub fn of(&self, kind: ParticleKind) -> &[Particle] {
        match kind {
            ParticleKind::Hydrogen => &self.hydrogen,
            ParticleKind::Oxygen => &self.oxygen,
            ParticleKind::Water => &self.water,
        }
    }

    pub fn of_mut(&mut self, kind: ParticleKind) -> &mut Vec<Particle> {
        match kind {
            ParticleKind::Hydrogen => &mut self.hydrogen,
            ParticleKind::Oxygen => &mut self.oxygen,
            ParticleKind::Water => &mut self.water,
        }
    }

    pub fn len(&self) -> usize {
        self.hydrogen.len() + self.oxygen.len() + self.water.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-frame movement and collision rules.
///
/// Each pass moves a particle right before testing it, so a slot recycled
/// ahead of the cursor is moved later in the same pass while recycled slots
/// behind it wait for the next frame. The pass order (hydrogen, oxygen,
/// water) is fixed.
pub struct CollisionResolver<'a> {
    factory: &'a ParticleFactory,
}

impl<'a> CollisionResolver<'a> {
    pub fn new(factory: &'a ParticleFactory) -> Self {
        Self { factory }
    }

    /// Run all three passes in order and collect their reactions.
    pub fn resolve<R: Rng>(&self, pops: &mut Populations, rng: &mut R) -> Result<Vec<Reaction>> {
        let mut reactions = Vec::new();
        self.hydrogen_pass(&mut pops.hydrogen, rng, &mut reactions)?;
        self.oxygen_pass(&mut pops.oxygen, &mut pops.hydrogen, &mut pops.water, rng, &mut reactions)?;
        self.water_pass(&mut pops.water, rng, &mut reactions);
        Ok(reactions)
    }

    /// Move each hydrogen, then bond it with the first free hydrogen ahead of
    /// it that it touches. The partner's slot is refilled with a new atom.
    pub fn hydrogen_pass<R: Rng>(
        &self,
        hydrogen: &mut [Particle],
        rng: &mut R,
        reactions: &mut Vec<Reaction>,
    ) -> Result<()> {
        let bounds = self.factory.bounds();
        let config = self.factory.config();

        for i in 0..hydrogen.len() {
            hydrogen[i].update_position(rng, &bounds, config);
            if hydrogen[i].is_merged() {
                continue;
            }

            // First hit wins, not the closest one.
            let partner = (i + 1..hydrogen.len())
                .find(|&j| !hydrogen[j].is_merged() && hydrogen[i].is_hit(&hydrogen[j]));
            if let Some(j) = partner {
                hydrogen[i].mark_merged(config);
                hydrogen[j] = self.factory.create(ParticleKind::Hydrogen, None, rng)?;
                reactions.push(Reaction::Bonded {
                    hydrogen: i,
                    replaced: j,
                });
            }
        }
        Ok(())
    }

    /// Move each oxygen, then turn every merged hydrogen it touches into a
    /// droplet at the oxygen's position.
    ///
    /// The oxygen slot is refilled on its first hit only, but the scan keeps
    /// going with the consumed atom's position, so one oxygen can form
    /// several droplets in the same frame.
    pub fn oxygen_pass<R: Rng>(
        &self,
        oxygen: &mut [Particle],
        hydrogen: &mut [Particle],
        water: &mut Vec<Particle>,
        rng: &mut R,
        reactions: &mut Vec<Reaction>,
    ) -> Result<()> {
        let bounds = self.factory.bounds();
        let config = self.factory.config();

        for oi in 0..oxygen.len() {
            oxygen[oi].update_position(rng, &bounds, config);
            let atom = oxygen[oi].clone();
            let mut consumed = false;

            for hi in 0..hydrogen.len() {
                if !atom.is_hit(&hydrogen[hi]) {
                    continue;
                }
                if !consumed {
                    oxygen[oi] = self.factory.create(ParticleKind::Oxygen, None, rng)?;
                    consumed = true;
                }
                hydrogen[hi] = self.factory.create(ParticleKind::Hydrogen, None, rng)?;
                water.push(
                    self.factory
                        .create(ParticleKind::Water, Some(atom.position), rng)?,
                );
                reactions.push(Reaction::WaterFormed {
                    oxygen: oi,
                    hydrogen: hi,
                    at: atom.position,
                });
            }
        }
        Ok(())
    }

    /// Let every droplet fall and drop the ones that expired. Walks from the
    /// back so removals never shift an unvisited droplet.
    pub fn water_pass<R: Rng>(
        &self,
        water: &mut Vec<Particle>,
        rng: &mut R,
        reactions: &mut Vec<Reaction>,
    ) {
        let bounds = self.factory.bounds();
        let config = self.factory.config();

        for i in (0..water.len()).rev() {
            water[i].update_position(rng, &bounds, config);
            if water[i].is_expired() {
                let drained = water.remove(i);
                reactions.push(Reaction::Drained {
                    index: i,
                    at: drained.position,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use mizu_common::Bounds;
    use rand::{RngCore, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    /// Yields zero and counts how many words were drawn.
    #[derive(Debug, Default)]
    struct CountingRng {
        draws: usize,
    }

    impl RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            self.draws += 1;
            0
        }

        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            self.draws += 1;
            dst.fill(0);
        }
    }

    fn still_factory() -> ParticleFactory {
        let cfg = SimConfig {
            impulse: 0.0,
            ..SimConfig::default()
        };
        ParticleFactory::new(Bounds::new(1000.0, 1000.0).unwrap(), cfg)
    }

    fn atom(kind: ParticleKind, x: f64, y: f64) -> Particle {
        let size = SimConfig::default().atom_size(kind).unwrap_or(20.0);
        Particle::new(kind, DVec2::new(x, y), size)
    }

    #[test]
    fn hydrogen_pass_first_hit_wins() {
        let f = still_factory();
        let r = CollisionResolver::new(&f);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        // 1 and 2 both touch 0; 2 is closer but 1 comes first.
        let mut h = vec![
            atom(ParticleKind::Hydrogen, 500.0, 500.0),
            atom(ParticleKind::Hydrogen, 510.0, 500.0),
            atom(ParticleKind::Hydrogen, 501.0, 500.0),
        ];
        let mut reactions = Vec::new();
        r.hydrogen_pass(&mut h, &mut rng, &mut reactions).unwrap();

        assert_eq!(h.len(), 3);
        assert!(h[0].is_merged());
        assert_eq!(
            reactions[0],
            Reaction::Bonded {
                hydrogen: 0,
                replaced: 1
            }
        );
    }

    #[test]
    fn hydrogen_pass_skips_merged_partners() {
        let f = still_factory();
        let r = CollisionResolver::new(&f);
        let cfg = SimConfig::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let mut merged = atom(ParticleKind::Hydrogen, 100.0, 100.0);
        merged.mark_merged(&cfg);
        let mut h = vec![atom(ParticleKind::Hydrogen, 100.0, 100.0), merged];
        let mut reactions = Vec::new();
        r.hydrogen_pass(&mut h, &mut rng, &mut reactions).unwrap();

        assert!(reactions.is_empty());
        assert!(!h[0].is_merged());
        assert!(h[1].is_merged());
    }

    #[test]
    fn oxygen_pass_forms_water_and_recycles_slots() {
        let f = still_factory();
        let r = CollisionResolver::new(&f);
        let cfg = SimConfig::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut h2 = atom(ParticleKind::Hydrogen, 300.0, 300.0);
        h2.mark_merged(&cfg);
        let mut h = vec![h2];
        let mut o = vec![atom(ParticleKind::Oxygen, 305.0, 300.0)];
        let mut w = Vec::new();
        let mut reactions = Vec::new();
        r.oxygen_pass(&mut o, &mut h, &mut w, &mut rng, &mut reactions)
            .unwrap();

        assert_eq!(h.len(), 1);
        assert_eq!(o.len(), 1);
        assert_eq!(w.len(), 1);
        assert!(!h[0].is_merged());
        assert_eq!(w[0].position, DVec2::new(305.0, 300.0));
        assert_eq!(
            reactions,
            vec![Reaction::WaterFormed {
                oxygen: 0,
                hydrogen: 0,
                at: DVec2::new(305.0, 300.0)
            }]
        );
    }

    #[test]
    fn one_oxygen_can_form_several_droplets() {
        let f = still_factory();
        let r = CollisionResolver::new(&f);
        let cfg = SimConfig::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let mut h: Vec<Particle> = (0..3)
            .map(|_| {
                let mut p = atom(ParticleKind::Hydrogen, 600.0, 600.0);
                p.mark_merged(&cfg);
                p
            })
            .collect();
        let mut o = vec![atom(ParticleKind::Oxygen, 600.0, 600.0)];
        let mut w = Vec::new();
        let mut reactions = Vec::new();
        r.oxygen_pass(&mut o, &mut h, &mut w, &mut rng, &mut reactions)
            .unwrap();

        assert_eq!(w.len(), 3);
        assert_eq!(o.len(), 1);
        assert!(h.iter().all(|p| !p.is_merged()));
        assert!(w.iter().all(|d| d.position == DVec2::new(600.0, 600.0)));
    }

    #[test]
    fn oxygen_slot_is_refilled_once_per_scan() {
        let f = still_factory();
        let r = CollisionResolver::new(&f);
        let cfg = SimConfig::default();
        let mut rng = CountingRng::default();
        let mut h: Vec<Particle> = (0..3)
            .map(|_| {
                let mut p = atom(ParticleKind::Hydrogen, 600.0, 600.0);
                p.mark_merged(&cfg);
                p
            })
            .collect();
        let mut o = vec![atom(ParticleKind::Oxygen, 600.0, 600.0)];
        let mut w = Vec::new();
        let mut reactions = Vec::new();
        r.oxygen_pass(&mut o, &mut h, &mut w, &mut rng, &mut reactions)
            .unwrap();

        // Drift angle, one new oxygen (x, y), then per hit a new hydrogen
        // (x, y) and a droplet size.
        assert_eq!(rng.draws, 1 + 2 + 3 * (2 + 1));
        assert_eq!(o[0].position, DVec2::ZERO);
        assert_eq!(reactions.len(), 3);
        assert!(reactions.iter().all(|re| matches!(
            re,
            Reaction::WaterFormed { oxygen: 0, at, .. } if *at == DVec2::new(600.0, 600.0)
        )));
    }

    #[test]
    fn slot_recycled_ahead_moves_in_the_same_pass() {
        let f = ParticleFactory::new(
            Bounds::new(1000.0, 1000.0).unwrap(),
            SimConfig::default(),
        );
        let r = CollisionResolver::new(&f);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        let mut h = vec![
            atom(ParticleKind::Hydrogen, 500.0, 500.0),
            atom(ParticleKind::Hydrogen, 505.0, 500.0),
        ];
        let mut reactions = Vec::new();
        r.hydrogen_pass(&mut h, &mut rng, &mut reactions).unwrap();

        assert_eq!(reactions.len(), 1);
        // Slot 1 was rebuilt at rest, then reached by the cursor.
        let impulse = SimConfig::default().impulse;
        assert!((h[1].velocity().length() - impulse).abs() < 1e-12);
        assert!((h[0].velocity().length() - impulse).abs() < 1e-12);
    }

    #[test]
    fn hydrogen_recycled_by_oxygen_waits_for_next_frame() {
        let f = ParticleFactory::new(
            Bounds::new(1000.0, 1000.0).unwrap(),
            SimConfig::default(),
        );
        let r = CollisionResolver::new(&f);
        let cfg = SimConfig::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let mut merged = atom(ParticleKind::Hydrogen, 300.0, 300.0);
        merged.mark_merged(&cfg);
        let mut pops = Populations {
            hydrogen: vec![merged],
            oxygen: vec![atom(ParticleKind::Oxygen, 302.0, 300.0)],
            water: Vec::new(),
        };
        let reactions = r.resolve(&mut pops, &mut rng).unwrap();

        let Reaction::WaterFormed { at, .. } = reactions[0] else {
            panic!("expected water, got {:?}", reactions[0]);
        };
        assert_eq!(pops.hydrogen[0].velocity(), DVec2::ZERO);
        assert_eq!(pops.oxygen[0].velocity(), DVec2::ZERO);
        assert!(!pops.hydrogen[0].is_merged());
        // The new droplet already took its first fall.
        let drop = &pops.water[0];
        assert_eq!(drop.position.y, at.y + drop.size() * cfg.fall_rate);
    }

    #[test]
    fn oxygen_ignores_free_hydrogen() {
        let f = still_factory();
        let r = CollisionResolver::new(&f);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let mut h = vec![atom(ParticleKind::Hydrogen, 50.0, 50.0)];
        let mut o = vec![atom(ParticleKind::Oxygen, 50.0, 50.0)];
        let mut w = Vec::new();
        let mut reactions = Vec::new();
        r.oxygen_pass(&mut o, &mut h, &mut w, &mut rng, &mut reactions)
            .unwrap();

        assert!(w.is_empty());
        assert!(reactions.is_empty());
        assert_eq!(o[0].position, DVec2::new(50.0, 50.0));
    }

    #[test]
    fn water_pass_removes_only_expired() {
        let f = still_factory();
        let r = CollisionResolver::new(&f);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(6);
        let mut w = vec![
            Particle::new(ParticleKind::Water, DVec2::new(1.0, 10.0), 20.0),
            Particle::new(ParticleKind::Water, DVec2::new(2.0, 999.0), 20.0),
            Particle::new(ParticleKind::Water, DVec2::new(3.0, 20.0), 20.0),
            Particle::new(ParticleKind::Water, DVec2::new(4.0, 1500.0), 20.0),
        ];
        let mut reactions = Vec::new();
        r.water_pass(&mut w, &mut rng, &mut reactions);

        assert_eq!(w.len(), 2);
        assert_eq!(w[0].position.y, 12.0);
        assert_eq!(w[1].position.y, 22.0);
        assert!(w.iter().all(|d| !d.is_expired()));
        let drained: Vec<usize> = reactions
            .iter()
            .filter_map(|r| match r {
                Reaction::Drained { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(drained, vec![3, 1]);
    }

    #[test]
    fn populations_route_by_kind() {
        let mut pops = Populations::default();
        assert!(pops.is_empty());
        pops.of_mut(ParticleKind::Oxygen)
            .push(atom(ParticleKind::Oxygen, 0.0, 0.0));
        assert_eq!(pops.of(ParticleKind::Oxygen).len(), 1);
        assert_eq!(pops.len(), 1);
    }
}
