//! Server network layer: websocket transport and the single event loop
//!
//! Every connection gets a reader task and a writer task. Readers decode
//! frames and forward them to the main loop over one channel; the main loop
//! owns the registry and the connection table and handles each message to
//! completion before taking the next. Per-connection order is preserved by
//! the channel, which is the only ordering the registry relies on.

use crate::client_manager::{ClientManager, OUTBOUND_QUEUE_CAPACITY};
use crate::dispatch::{handle_client_event, handle_disconnect, Dispatch};
use crate::registry::SessionRegistry;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{now_millis, ClientEvent, ConnectionId, ServerEvent, WireEvent};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Messages sent from network tasks to the main server loop
pub enum ServerMessage {
    ConnectionOpened {
        addr: SocketAddr,
        socket: WebSocketStream<TcpStream>,
    },
    EventReceived {
        id: ConnectionId,
        event: ClientEvent,
    },
    ConnectionClosed {
        id: ConnectionId,
    },
}

/// Presence server owning all session state for the process lifetime
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    registry: SessionRegistry,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(addr: &str, max_clients: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(max_clients),
            registry: SessionRegistry::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns the task accepting TCP connections and upgrading them
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        continue;
                    }
                };

                // Handshakes run off the accept loop so a slow peer cannot stall it
                let server_tx = server_tx.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(socket) => {
                            if server_tx
                                .send(ServerMessage::ConnectionOpened { addr, socket })
                                .is_err()
                            {
                                error!("Server loop gone, dropping connection from {}", addr);
                            }
                        }
                        Err(e) => warn!("Websocket handshake with {} failed: {}", addr, e),
                    }
                });
            }
        });
    }

    /// Registers an upgraded socket and spawns its reader and writer tasks
    fn open_connection(&mut self, addr: SocketAddr, socket: WebSocketStream<TcpStream>) {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_CAPACITY);

        let Some(id) = self.clients.add_client(addr, outbound_tx) else {
            // Dropping the socket closes it
            return;
        };

        let (mut sink, mut stream) = socket.split();

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    debug!("Writer for {} stopped: {}", addr, e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let server_tx = self.server_tx.clone();
        let reader_id = id.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ClientEvent::decode(&text) {
                        Ok(event) => {
                            let message = ServerMessage::EventReceived {
                                id: reader_id.clone(),
                                event,
                            };
                            if server_tx.send(message).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("Ignoring malformed frame from {}: {}", reader_id, e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Binary(_)) => {
                        warn!("Ignoring binary frame from {}", reader_id);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Connection {} errored: {}", reader_id, e);
                        break;
                    }
                }
            }

            let _ = server_tx.send(ServerMessage::ConnectionClosed { id: reader_id });
        });

        self.deliver(vec![Dispatch::Unicast {
            to: id.clone(),
            event: ServerEvent::Connected(id),
        }]);
    }

    /// Encodes each outbound event once and queues it per its fan-out rule
    ///
    /// Connections that stop draining their queue are dropped, and their
    /// departure is delivered in turn.
    fn deliver(&mut self, dispatches: Vec<Dispatch>) {
        let mut pending = dispatches;
        while !pending.is_empty() {
            for dispatch in std::mem::take(&mut pending) {
                self.queue(dispatch);
            }
            for id in self.clients.take_stalled() {
                warn!("Dropping {}: outbound queue full", id);
                pending.extend(self.close_connection(&id));
            }
        }
    }

    fn queue(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Unicast { to, event } => match event.encode() {
                Ok(frame) => {
                    if !self.clients.send_to(&to, &frame) {
                        debug!("Could not queue frame for {}", to);
                    }
                }
                Err(e) => error!("Failed to encode event for {}: {}", to, e),
            },
            Dispatch::Broadcast { event, exclude } => match event.encode() {
                Ok(frame) => {
                    let sent = self.clients.broadcast(&frame, exclude.as_ref());
                    debug!("Broadcast queued for {} connections", sent);
                }
                Err(e) => error!("Failed to encode broadcast: {}", e),
            },
        }
    }

    /// Handles one message to completion
    fn process(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::ConnectionOpened { addr, socket } => {
                self.open_connection(addr, socket);
            }
            ServerMessage::EventReceived { id, event } => {
                if !self.clients.contains(&id) {
                    return;
                }
                let dispatches = handle_client_event(&mut self.registry, &id, event, now_millis());
                self.deliver(dispatches);
            }
            ServerMessage::ConnectionClosed { id } => {
                let dispatches = self.close_connection(&id);
                self.deliver(dispatches);
            }
        }
    }

    /// Forgets a connection and its session
    ///
    /// Returns nothing if the connection was already gone, so a reader
    /// reporting a connection the server dropped itself is a no-op.
    fn close_connection(&mut self, id: &ConnectionId) -> Vec<Dispatch> {
        if !self.clients.remove_client(id) {
            return Vec::new();
        }
        let dispatches = handle_disconnect(&mut self.registry, id);
        info!(
            "Total players: {}, connections: {}",
            self.registry.len(),
            self.clients.len()
        );
        dispatches
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();
        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            self.process(message);
        }

        info!("Server shutting down");
        Ok(())
    }
}
