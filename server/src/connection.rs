use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Handler, Message, Running, StreamHandler,
    WrapFuture,
};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use system::{ClientMessage, ConnectionId};

use crate::connection_tx_storage::Frame;
use crate::server::{ServerCommand, ServerHandle, ServerTx};

#[derive(Message)]
#[rtype(result = "()")]
enum ConnectionActorMessage {
    Frame(Frame),
    /// The server task dropped our outbound channel.
    Released,
}

/// One live WebSocket client.
///
/// Rooms joined by this connection are tracked by the relay engine; the actor
/// only moves frames and reports its own end.
pub struct ConnectionActor {
    connection_id: ConnectionId,
    srv_tx: ServerTx,
    buffer: usize,
}

impl ConnectionActor {
    pub fn new(connection_id: ConnectionId, srv_tx: ServerTx, buffer: usize) -> Self {
        Self {
            connection_id,
            srv_tx,
            buffer,
        }
    }

    /// Queues a command for the server task. The actor stops reading its socket
    /// until the queue has room, so commands keep their order.
    fn forward(&self, command: ServerCommand, ctx: &mut ws::WebsocketContext<Self>) {
        let srv_tx = self.srv_tx.clone();
        ctx.wait(
            async move { srv_tx.send(command).await }
                .into_actor(self)
                .map(|result, act, ctx| {
                    if result.is_err() {
                        log::error!(
                            "Relay server is gone; closing connection {}",
                            act.connection_id
                        );
                        ctx.stop();
                    }
                }),
        );
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Frame>(self.buffer);

        self.forward(
            ServerCommand::Connect {
                connection_id: self.connection_id,
                tx,
            },
            ctx,
        );

        let addr = ctx.address().recipient();
        let connection_id = self.connection_id;

        tokio::spawn(async move {
            log::debug!("connection {} egress - started", connection_id);
            while let Some(frame) = rx.recv().await {
                if addr.send(ConnectionActorMessage::Frame(frame)).await.is_err() {
                    break;
                }
            }
            addr.do_send(ConnectionActorMessage::Released);
            log::debug!("connection {} egress - terminated", connection_id);
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        let srv_tx = self.srv_tx.clone();
        let from = self.connection_id;
        tokio::spawn(async move {
            let _ = srv_tx.send(ServerCommand::Disconnect { from }).await;
        });

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => match ClientMessage::from_json(&text) {
                Ok(message) => self.forward(
                    ServerCommand::ClientMessage {
                        from: self.connection_id,
                        message,
                    },
                    ctx,
                ),
                Err(err) => {
                    log::debug!(
                        "Dropping malformed message from {}: {}",
                        self.connection_id,
                        err
                    );
                }
            },
            Ok(ws::Message::Binary(bin)) => {
                log::debug!(
                    "Ignoring binary frame of {} bytes from {}",
                    bin.len(),
                    self.connection_id
                );
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Pong(_)) | Ok(ws::Message::Nop) => (),
            Ok(ws::Message::Continuation(_)) => {
                log::debug!("Ignoring continuation frame from {}", self.connection_id);
            }
            Err(err) => {
                log::warn!("Protocol error on connection {}: {}", self.connection_id, err);
                ctx.stop();
            }
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: ConnectionActorMessage, ctx: &mut Self::Context) -> Self::Result {
        match msg {
            ConnectionActorMessage::Frame(frame) => {
                log::debug!("Egress to {}: {}", self.connection_id, frame.as_str());
                ctx.text(frame.as_str());
            }
            ConnectionActorMessage::Released => {
                ctx.close(Some(CloseReason {
                    code: CloseCode::Again,
                    description: Some("released by relay".into()),
                }));
                ctx.stop();
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<ServerHandle>,
) -> Result<HttpResponse, Error> {
    let actor = ConnectionActor::new(
        server.next_connection_id(),
        server.sender(),
        server.connection_buffer(),
    );
    ws::WsResponseBuilder::new(actor, &req, stream)
        .frame_size(server.max_frame_size())
        .start()
}
