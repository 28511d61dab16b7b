use mizu_common::Result;
use mizu_kernel::{SimEvent, World};
use serde::{Deserialize, Serialize};

/// A verifiable copy of the world at a specific tick.
///
/// The world carries its random generator, so restoring a snapshot and
/// stepping it continues the original run exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The tick at which this snapshot was taken.
    pub tick: u64,
    pub world: World,
    /// FNV-1a over the tick and the world's debug representation.
    pub hash: u64,
}

impl Snapshot {
    /// Capture the current world. Pending events and the recording switch
    /// are not part of the copy, so a decoded snapshot hashes the same.
    pub fn capture(world: &World) -> Self {
        let mut world = world.clone();
        world.drain_events();
        world.record_events(false);
        let tick = world.tick();
        let hash = content_hash(tick, &world);
        Self { tick, world, hash }
    }

    /// Verify the snapshot integrity by recomputing the hash.
    pub fn verify(&self) -> bool {
        self.tick == self.world.tick() && self.hash == content_hash(self.tick, &self.world)
    }

    /// Rebuild the captured world with an empty event log.
    pub fn restore(&self) -> World {
        self.world.clone()
    }
}

/// Re-apply one logged event. `Reacted` entries are outcomes of stepping and
/// are skipped.
pub fn apply_event(world: &mut World, event: &SimEvent) -> Result<()> {
    match event {
        SimEvent::Initialized { hydrogen, oxygen } => world.init(*hydrogen, *oxygen),
        SimEvent::Inserted { particle } => {
            world.insert(particle.clone());
            Ok(())
        }
        SimEvent::Reacted { .. } => Ok(()),
        SimEvent::Stepped { tick } => world.advance_to(*tick),
    }
}

/// Append-only event log for persistence and replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append events to the log. Events are never modified after writing.
    pub fn append(&mut self, events: &[SimEvent]) {
        self.events.extend_from_slice(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Highest tick any `Stepped` entry reached.
    pub fn last_tick(&self) -> Option<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Stepped { tick } => Some(*tick),
                _ => None,
            })
            .max()
    }

    /// Restore `snapshot` and re-apply every entry from `offset` on.
    ///
    /// `offset` is the log length at the time the snapshot was taken, so
    /// entries already reflected in the snapshot are not applied twice.
    pub fn replay_from(&self, snapshot: &Snapshot, offset: usize) -> Result<World> {
        let mut world = snapshot.restore();
        for event in self.events.iter().skip(offset) {
            apply_event(&mut world, event)?;
        }
        world.drain_events();
        Ok(world)
    }
}

/// In-memory snapshot store for rollback during a session.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    /// Each snapshot with the log length at capture time.
    snapshots: Vec<(Snapshot, usize)>,
    log: EventLog,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flush pending events, then snapshot the world. Returns its index.
    /// The world records from here on so later ticks can be replayed.
    pub fn take_snapshot(&mut self, world: &mut World) -> usize {
        self.flush_events(world);
        world.record_events(true);
        self.snapshots
            .push((Snapshot::capture(world), self.log.len()));
        self.snapshots.len() - 1
    }

    /// Move pending events from the world into the log.
    pub fn flush_events(&mut self, world: &mut World) {
        let events = world.drain_events();
        self.log.append(&events);
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn get_snapshot(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index).map(|(snap, _)| snap)
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// The world exactly as it was at snapshot `index`.
    pub fn rollback(&self, index: usize) -> Option<World> {
        self.get_snapshot(index).map(Snapshot::restore)
    }

    /// Rebuild the newest state the log knows about, starting from the latest
    /// snapshot. `None` when nothing was captured yet.
    pub fn replay_latest(&self) -> Result<Option<World>> {
        let Some((snap, offset)) = self.snapshots.last() else {
            return Ok(None);
        };
        self.log.replay_from(snap, *offset).map(Some)
    }
}

fn content_hash(tick: u64, world: &World) -> u64 {
    fnv1a_hash(&format!("{tick}{world:?}"))
}

fn fnv1a_hash(data: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in data.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
