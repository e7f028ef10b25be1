use std::collections::HashMap;
use std::sync::Arc;
use system::ConnectionId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// One encoded server message, shared by every recipient of a broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame(pub Arc<str>);

impl Frame {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub type ConnectionTx = Sender<Frame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// No sender registered under that id.
    Unknown,
    /// The connection is not draining its buffer.
    Full,
    /// The connection side has gone away.
    Closed,
}

/// Outbound channels of every live connection, owned by the server task.
///
/// Sends never wait: a relay that awaited one slow socket would stall every room.
pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connection_txs.contains_key(connection_id)
    }

    pub fn send(&self, to: &ConnectionId, frame: Frame) -> Result<(), DeliveryFailure> {
        let tx = self
            .connection_txs
            .get(to)
            .ok_or(DeliveryFailure::Unknown)?;
        tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryFailure::Full,
            TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }

    /// Dropping the sender is what tells the connection it has been released.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connection_txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connection_txs.is_empty()
    }
}

impl Default for ConnectionTxStorage {
    fn default() -> Self {
        Self::new()
    }
}
