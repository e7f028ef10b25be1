use crate::{CodeSnapshot, RoomId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct RoomEntry {
    snapshot: CodeSnapshot,
    last_active: Instant,
}

impl RoomEntry {
    fn new(snapshot: CodeSnapshot, now: Instant) -> Self {
        Self {
            snapshot,
            last_active: now,
        }
    }
}

/// Last known code state of every room the process has seen.
///
/// Not synchronized: exactly one owner (the relay engine) mutates it.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, RoomEntry>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&CodeSnapshot> {
        self.rooms.get(room_id).map(|entry| &entry.snapshot)
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Overwrites the snapshot, creating the room when it is unknown.
    pub fn set(&mut self, room_id: &RoomId, snapshot: CodeSnapshot, now: Instant) {
        match self.rooms.get_mut(room_id) {
            Some(entry) => {
                entry.snapshot = snapshot;
                entry.last_active = now;
            }
            None => {
                self.rooms
                    .insert(room_id.clone(), RoomEntry::new(snapshot, now));
            }
        }
    }

    /// Seeds a room. An existing room is overwritten; its old snapshot is returned.
    pub fn create(
        &mut self,
        room_id: RoomId,
        initial: CodeSnapshot,
        now: Instant,
    ) -> Option<CodeSnapshot> {
        self.rooms
            .insert(room_id, RoomEntry::new(initial, now))
            .map(|previous| previous.snapshot)
    }

    /// Returns the room's snapshot, materializing a blank room for unknown ids.
    pub fn get_or_blank(&mut self, room_id: &RoomId, now: Instant) -> &CodeSnapshot {
        let entry = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| RoomEntry::new(CodeSnapshot::default(), now));
        entry.last_active = now;
        &entry.snapshot
    }

    pub fn touch(&mut self, room_id: &RoomId, now: Instant) {
        if let Some(entry) = self.rooms.get_mut(room_id) {
            entry.last_active = now;
        }
    }

    pub fn idle_for(&self, room_id: &RoomId, now: Instant) -> Option<Duration> {
        self.rooms
            .get(room_id)
            .map(|entry| now.saturating_duration_since(entry.last_active))
    }

    pub fn remove(&mut self, room_id: &RoomId) -> Option<CodeSnapshot> {
        self.rooms.remove(room_id).map(|entry| entry.snapshot)
    }

    /// Rooms whose last activity is older than `ttl`.
    pub fn idle_rooms(&self, now: Instant, ttl: Duration) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_active) > ttl)
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &RoomId> + '_ {
        self.rooms.keys()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
