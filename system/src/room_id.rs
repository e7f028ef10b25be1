use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const ROOM_ID_LENGTH: usize = 12;

/// URL-safe symbols. 64 of them, so a 6-bit mask over a random byte is uniform.
const ALPHABET: &[u8; 64] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id looks like one this process could have generated.
    ///
    /// Ids are opaque on the wire, so the relay never rejects an id that
    /// fails this check.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == ROOM_ID_LENGTH && self.0.bytes().all(|b| ALPHABET.contains(&b))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Error)]
pub enum RoomIdError {
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("no unused room id after {0} attempts")]
    Exhausted(usize),
}

pub trait RoomIdGenerator: Send {
    fn generate(&mut self) -> Result<RoomId, RoomIdError>;
}

/// Draws ids from the operating system's CSPRNG.
#[derive(Debug, Default)]
pub struct OsRoomIdGenerator;

impl RoomIdGenerator for OsRoomIdGenerator {
    fn generate(&mut self) -> Result<RoomId, RoomIdError> {
        let mut bytes = [0u8; ROOM_ID_LENGTH];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| RoomIdError::Entropy(err.to_string()))?;
        Ok(RoomId(encode(&bytes)))
    }
}

fn encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| ALPHABET[(b & 63) as usize] as char)
        .collect()
}
