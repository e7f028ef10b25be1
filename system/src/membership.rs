use crate::{ConnectionId, RoomId};
use std::collections::{HashMap, HashSet};

/// Which connections are joined to which rooms, indexed both ways.
///
/// Connections are kept in join order so fan-out order is stable.
#[derive(Default)]
pub struct MembershipIndex {
    room_members: HashMap<RoomId, Vec<ConnectionId>>,
    connection_rooms: HashMap<ConnectionId, HashSet<RoomId>>,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the connection was already joined.
    pub fn join(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> bool {
        let rooms = self.connection_rooms.entry(connection_id).or_default();
        if !rooms.insert(room_id.clone()) {
            return false;
        }
        self.room_members
            .entry(room_id.clone())
            .or_default()
            .push(connection_id);
        true
    }

    pub fn is_member(&self, connection_id: ConnectionId, room_id: &RoomId) -> bool {
        self.connection_rooms
            .get(&connection_id)
            .map_or(false, |rooms| rooms.contains(room_id))
    }

    pub fn members(&self, room_id: &RoomId) -> &[ConnectionId] {
        self.room_members
            .get(room_id)
            .map(|members| members.as_slice())
            .unwrap_or(&[])
    }

    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.members(room_id).len()
    }

    /// Drops every membership of the connection. Returns the rooms it had joined.
    pub fn leave_all(&mut self, connection_id: ConnectionId) -> Vec<RoomId> {
        let rooms = match self.connection_rooms.remove(&connection_id) {
            Some(rooms) => rooms,
            None => return Vec::new(),
        };
        for room_id in &rooms {
            if let Some(members) = self.room_members.get_mut(room_id) {
                members.retain(|c| *c != connection_id);
                if members.is_empty() {
                    self.room_members.remove(room_id);
                }
            }
        }
        rooms.into_iter().collect()
    }

    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        self.connection_rooms
            .get(&connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent() {
        let mut index = MembershipIndex::new();
        let room: RoomId = "r".into();
        assert!(index.join(1, &room));
        assert!(!index.join(1, &room));
        assert_eq!(index.members(&room), &[1]);
    }

    #[test]
    fn it_keeps_join_order() {
        let mut index = MembershipIndex::new();
        let room: RoomId = "r".into();
        index.join(3, &room);
        index.join(1, &room);
        index.join(2, &room);
        assert_eq!(index.members(&room), &[3, 1, 2]);
    }

    #[test]
    fn leave_all_releases_every_room() {
        let mut index = MembershipIndex::new();
        let a: RoomId = "a".into();
        let b: RoomId = "b".into();
        index.join(1, &a);
        index.join(1, &b);
        index.join(2, &a);

        let mut left = index.leave_all(1);
        left.sort();
        assert_eq!(left, vec![a.clone(), b.clone()]);
        assert_eq!(index.members(&a), &[2]);
        assert!(index.members(&b).is_empty());
        assert!(!index.is_member(1, &a));
        assert!(index.rooms_of(1).is_empty());
        assert!(index.leave_all(1).is_empty());
    }
}
