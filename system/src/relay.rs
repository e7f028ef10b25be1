use crate::{
    ChangeCode, ClientMessage, CodeChanged, CodeSnapshot, ConnectionId, JoinRoom,
    MembershipIndex, OsRoomIdGenerator, RoomId, RoomIdError, RoomIdGenerator, RoomRegistry,
    ServerMessage, StartCode,
};
use serde::Serialize;
use std::time::{Duration, Instant};

/// How many fresh ids `create_room` draws before giving up on finding an unused one.
pub const MAX_ROOM_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct RelayPolicy {
    /// Drop edits from connections that never joined the target room.
    /// Off by default: knowing a room id is enough to edit it.
    pub require_membership: bool,
}

/// A message and the connections it has to be delivered to.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub recipients: Vec<ConnectionId>,
    pub message: ServerMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub members: usize,
    pub idle_secs: u64,
}

/// Routing core of the relay.
///
/// Every event for every room goes through `&mut self`, so whoever owns the
/// engine is the single serialization point: events are applied and fanned out
/// in exactly the order they are handed in.
pub struct RelayEngine {
    registry: RoomRegistry,
    memberships: MembershipIndex,
    room_ids: Box<dyn RoomIdGenerator>,
    policy: RelayPolicy,
}

impl RelayEngine {
    pub fn new(
        registry: RoomRegistry,
        room_ids: Box<dyn RoomIdGenerator>,
        policy: RelayPolicy,
    ) -> Self {
        Self {
            registry,
            memberships: MembershipIndex::new(),
            room_ids,
            policy,
        }
    }

    pub fn with_policy(policy: RelayPolicy) -> Self {
        Self::new(RoomRegistry::new(), Box::new(OsRoomIdGenerator), policy)
    }

    pub fn create_room(
        &mut self,
        initial: CodeSnapshot,
        now: Instant,
    ) -> Result<RoomId, RoomIdError> {
        for _ in 0..MAX_ROOM_ID_ATTEMPTS {
            let room_id = self.room_ids.generate()?;
            if self.registry.contains(&room_id) {
                log::warn!("Generated room id {} is already taken", room_id);
                continue;
            }
            self.registry.create(room_id.clone(), initial, now);
            log::info!("Room {} created", room_id);
            return Ok(room_id);
        }
        Err(RoomIdError::Exhausted(MAX_ROOM_ID_ATTEMPTS))
    }

    /// Applies one client message. `None` means the message was dropped.
    pub fn handle(
        &mut self,
        from: ConnectionId,
        message: ClientMessage,
        now: Instant,
    ) -> Option<Outgoing> {
        if message.room_id().as_str().is_empty() {
            log::debug!("Dropping message with empty room id from {}", from);
            return None;
        }
        match message {
            ClientMessage::JoinRoom(join) => Some(self.join(from, join, now)),
            ClientMessage::ChangeCode(change) => self.change_code(from, change, now),
        }
    }

    /// Joins `from` to the room and announces the room state to every member,
    /// the joiner included.
    pub fn join(&mut self, from: ConnectionId, join: JoinRoom, now: Instant) -> Outgoing {
        let JoinRoom { room_id, joiner_id } = join;
        if self.memberships.join(from, &room_id) {
            log::info!("Connection {} joined room {}", from, room_id);
        }
        let code = self.registry.get_or_blank(&room_id, now).clone();
        Outgoing {
            recipients: self.memberships.members(&room_id).to_vec(),
            message: ServerMessage::StartCode(StartCode {
                sender_id: joiner_id,
                code,
            }),
        }
    }

    /// Overwrites the room snapshot and forwards the edit to everyone but `from`.
    pub fn change_code(
        &mut self,
        from: ConnectionId,
        change: ChangeCode,
        now: Instant,
    ) -> Option<Outgoing> {
        let ChangeCode {
            room_id,
            sender_id,
            code,
            extra,
        } = change;
        if self.policy.require_membership && !self.memberships.is_member(from, &room_id) {
            log::warn!(
                "Connection {} edited room {} without joining it; dropped",
                from,
                room_id
            );
            return None;
        }
        self.registry.set(&room_id, code.clone(), now);
        let recipients = self
            .memberships
            .members(&room_id)
            .iter()
            .copied()
            .filter(|connection_id| *connection_id != from)
            .collect();
        Some(Outgoing {
            recipients,
            message: ServerMessage::CodeChanged(CodeChanged {
                sender_id,
                code,
                extra,
            }),
        })
    }

    /// Releases every membership of a closed connection.
    pub fn disconnect(&mut self, from: ConnectionId, now: Instant) -> Vec<RoomId> {
        let rooms = self.memberships.leave_all(from);
        for room_id in &rooms {
            self.registry.touch(room_id, now);
        }
        rooms
    }

    /// Removes rooms nobody is joined to that have been idle longer than `ttl`.
    pub fn sweep_idle_rooms(&mut self, now: Instant, ttl: Duration) -> Vec<RoomId> {
        let memberships = &self.memberships;
        let evicted = self
            .registry
            .idle_rooms(now, ttl)
            .into_iter()
            .filter(|room_id| memberships.member_count(room_id) == 0)
            .collect::<Vec<_>>();
        for room_id in &evicted {
            self.registry.remove(room_id);
        }
        evicted
    }

    pub fn room_summaries(&self, now: Instant) -> Vec<RoomSummary> {
        let mut summaries = self
            .registry
            .room_ids()
            .map(|room_id| RoomSummary {
                room_id: room_id.clone(),
                members: self.memberships.member_count(room_id),
                idle_secs: self
                    .registry
                    .idle_for(room_id, now)
                    .unwrap_or_default()
                    .as_secs(),
            })
            .collect::<Vec<_>>();
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }

    pub fn snapshot(&self, room_id: &RoomId) -> Option<&CodeSnapshot> {
        self.registry.get(room_id)
    }

    pub fn members(&self, room_id: &RoomId) -> &[ConnectionId] {
        self.memberships.members(room_id)
    }

    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        self.memberships.rooms_of(connection_id)
    }

    pub fn room_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::with_policy(RelayPolicy::default())
    }
}
