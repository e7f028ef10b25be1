use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{channel, Sender, WeakSender};
use tokio::sync::oneshot;

use system::{
    ClientMessage, CodeSnapshot, ConnectionId, Outgoing, RelayEngine, RelayPolicy, RoomId,
    RoomIdError, RoomSummary,
};

use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage, DeliveryFailure, Frame};
use crate::error::ServerError;

pub type ServerTx = Sender<ServerCommand>;

#[derive(Debug)]
pub enum ServerCommand {
    Connect {
        connection_id: ConnectionId,
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    ClientMessage {
        from: ConnectionId,
        message: ClientMessage,
    },
    CreateRoom {
        code: CodeSnapshot,
        tx: oneshot::Sender<Result<RoomId, RoomIdError>>,
    },
    ListRooms {
        tx: oneshot::Sender<Vec<RoomSummary>>,
    },
    SweepIdleRooms {
        ttl: Duration,
    },
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Commands buffered in front of the server task.
    pub queue_capacity: usize,
    /// Frames buffered per connection before it is considered too slow.
    pub connection_buffer: usize,
    pub max_frame_size: usize,
    pub policy: RelayPolicy,
    /// Empty rooms idle for longer than this are dropped. `None` keeps rooms forever.
    pub idle_ttl: Option<Duration>,
    pub sweep_interval: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            connection_buffer: 64,
            max_frame_size: 1 << 20,
            policy: RelayPolicy::default(),
            idle_ttl: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Cloneable access to the running server task.
#[derive(Clone)]
pub struct ServerHandle {
    tx: ServerTx,
    connection_id_source: Arc<AtomicU64>,
    connection_buffer: usize,
    max_frame_size: usize,
}

impl ServerHandle {
    pub fn sender(&self) -> ServerTx {
        self.tx.clone()
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        self.connection_id_source.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_buffer(&self) -> usize {
        self.connection_buffer
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub async fn create_room(&self, code: CodeSnapshot) -> Result<RoomId, ServerError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ServerCommand::CreateRoom { code, tx })
            .await
            .map_err(|_| ServerError::RelayUnavailable)?;
        let room_id = rx.await.map_err(|_| ServerError::RelayUnavailable)??;
        Ok(room_id)
    }

    /// Also usable as a barrier: every command queued before it has been applied
    /// once it returns.
    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, ServerError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ServerCommand::ListRooms { tx })
            .await
            .map_err(|_| ServerError::RelayUnavailable)?;
        rx.await.map_err(|_| ServerError::RelayUnavailable)
    }
}

struct Server {
    engine: RelayEngine,
    connections: ConnectionTxStorage,
}

impl Server {
    fn new(engine: RelayEngine) -> Self {
        Self {
            engine,
            connections: ConnectionTxStorage::new(),
        }
    }

    fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connect { connection_id, tx } => {
                self.connections.insert(connection_id, tx);
                log::info!("Connection {} opened", connection_id);
            }
            ServerCommand::Disconnect { from } => self.disconnect(from),
            ServerCommand::ClientMessage { from, message } => {
                if !self.connections.contains(&from) {
                    log::debug!("Ignoring message from released connection {}", from);
                    return;
                }
                log::debug!("Ingress from {}: {:?}", from, message);
                if let Some(outgoing) = self.engine.handle(from, message, Instant::now()) {
                    self.deliver(outgoing);
                }
            }
            ServerCommand::CreateRoom { code, tx } => {
                let result = self.engine.create_room(code, Instant::now());
                if let Err(ref err) = result {
                    log::error!("Failed to create room: {}", err);
                }
                let _ = tx.send(result);
            }
            ServerCommand::ListRooms { tx } => {
                let _ = tx.send(self.engine.room_summaries(Instant::now()));
            }
            ServerCommand::SweepIdleRooms { ttl } => {
                let evicted = self.engine.sweep_idle_rooms(Instant::now(), ttl);
                if !evicted.is_empty() {
                    log::info!("Dropped {} idle rooms", evicted.len());
                }
            }
        }
    }

    fn deliver(&mut self, outgoing: Outgoing) {
        let Outgoing {
            recipients,
            message,
        } = outgoing;
        let frame = match message.to_json() {
            Ok(text) => Frame(Arc::from(text)),
            Err(err) => {
                log::error!("Failed to encode {:?}: {}", message, err);
                return;
            }
        };

        let mut released = Vec::new();
        for connection_id in recipients {
            match self.connections.send(&connection_id, frame.clone()) {
                Ok(()) => {}
                Err(DeliveryFailure::Full) => {
                    log::warn!(
                        "Connection {} is not keeping up; releasing it",
                        connection_id
                    );
                    released.push(connection_id);
                }
                Err(DeliveryFailure::Closed) | Err(DeliveryFailure::Unknown) => {
                    released.push(connection_id);
                }
            }
        }
        for connection_id in released {
            self.disconnect(connection_id);
        }
    }

    fn disconnect(&mut self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        let rooms = self.engine.disconnect(connection_id, Instant::now());
        log::info!(
            "Connection {} closed, left {} room(s)",
            connection_id,
            rooms.len()
        );
    }
}

pub fn spawn_server(options: ServerOptions) -> ServerHandle {
    let engine = RelayEngine::with_policy(options.policy);
    spawn_server_with(engine, options)
}

/// Spawns the single task that owns `engine`. Every command from every
/// connection and HTTP handler is applied by this task, in queue order.
pub fn spawn_server_with(engine: RelayEngine, options: ServerOptions) -> ServerHandle {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(options.queue_capacity.max(1));

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(engine));

        while let Some(command) = srv_rx.recv().await {
            server.handle_command(command);
        }
        log::info!("Relay server stopped");
    });

    if let Some(ttl) = options.idle_ttl {
        spawn_sweeper(srv_tx.downgrade(), ttl, options.sweep_interval);
    }

    ServerHandle {
        tx: srv_tx,
        connection_id_source: Arc::new(AtomicU64::new(0)),
        connection_buffer: options.connection_buffer.max(1),
        max_frame_size: options.max_frame_size,
    }
}

/// The sweeper holds only a weak sender, so it never keeps the server task
/// alive once every `ServerHandle` is gone.
fn spawn_sweeper(srv_tx: WeakSender<ServerCommand>, ttl: Duration, every: Duration) {
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let srv_tx = match srv_tx.upgrade() {
                Some(srv_tx) => srv_tx,
                None => break,
            };
            if srv_tx
                .send(ServerCommand::SweepIdleRooms { ttl })
                .await
                .is_err()
            {
                break;
            }
        }
        log::debug!("Idle room sweeper stopped");
    });
}
