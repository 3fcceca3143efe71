//! Server network layer handling WebSocket connections and the game loop

use crate::config::GameConfig;
use crate::error::ServerError;
use crate::session::{ConnectionId, Lobby, Outbound, SessionInput};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        connection: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    },
    MessageReceived {
        connection: ConnectionId,
        message: ClientMessage,
    },
    Disconnected {
        connection: ConnectionId,
    },
}

/// Main server coordinating connections, the broadcast tick and liveness
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: GameConfig,
    lobby: Lobby,
    tick: u64,

    // Per-connection outbound queues, drained by each connection's writer task
    outbound: HashMap<ConnectionId, mpsc::Sender<Message>>,

    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    pub async fn bind(addr: &str, config: GameConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            lobby: Lobby::new(config.clone()),
            config,
            tick: 0,
            outbound: HashMap::new(),
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts sockets and hands each one its own task
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let event_tx = self.event_tx.clone();
        let queue = self.config.outbound_queue;

        tokio::spawn(async move {
            let mut next_connection: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let connection = next_connection;
                        next_connection += 1;
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            connection,
                            event_tx.clone(),
                            queue,
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected {
                connection,
                addr,
                sender,
            } => {
                debug!("Connection {} opened from {}", connection, addr);
                self.outbound.insert(connection, sender);
                self.lobby.connect(connection);
            }
            NetworkEvent::MessageReceived {
                connection,
                message,
            } => {
                let outbound = self
                    .lobby
                    .handle(connection, SessionInput::Message(message));
                self.dispatch(outbound);
            }
            NetworkEvent::Disconnected { connection } => {
                self.outbound.remove(&connection);
                let outbound = self.lobby.handle(connection, SessionInput::Closed);
                self.dispatch(outbound);
            }
        }
    }

    /// Carries out what the lobby asked for
    fn dispatch(&mut self, outbound: Vec<Outbound>) {
        let mut queue: VecDeque<Outbound> = outbound.into();
        let mut broadcast = false;

        while let Some(item) = queue.pop_front() {
            match item {
                Outbound::Send {
                    connection,
                    message,
                } => {
                    if let Err(e) = self.send_to(connection, &message) {
                        warn!("Evicting connection {}: {}", connection, e);
                        queue.extend(
                            self.lobby
                                .handle(connection, SessionInput::TransportFailed),
                        );
                    }
                }
                Outbound::BroadcastState => broadcast = true,
                Outbound::Close { connection } => self.close(connection),
            }
        }

        if broadcast {
            self.broadcast_snapshots();
        }
    }

    /// Queues one frame without waiting; a full queue drops the frame
    fn send_to(&mut self, connection: ConnectionId, message: &ServerMessage) -> Result<(), ServerError> {
        let Some(sender) = self.outbound.get(&connection) else {
            return Err(ServerError::ConnectionClosed(connection));
        };

        let text = shared::encode(message)?;
        match sender.try_send(Message::text(text)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full for connection {}, frame dropped", connection);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                self.outbound.remove(&connection);
                Err(ServerError::ConnectionClosed(connection))
            }
        }
    }

    fn close(&mut self, connection: ConnectionId) {
        if let Some(sender) = self.outbound.remove(&connection) {
            // The writer task exits once the close frame is out or the queue is dropped
            let _ = sender.try_send(Message::Close(None));
        }
    }

    /// Sends every registered connection its own filtered snapshot
    fn broadcast_snapshots(&mut self) {
        let mut failed = Vec::new();

        for (connection, message) in self.lobby.snapshots() {
            if let Err(e) = self.send_to(connection, &message) {
                debug!("Snapshot to connection {} failed: {}", connection, e);
                failed.push(connection);
            }
        }

        for connection in failed {
            let outbound = self
                .lobby
                .handle(connection, SessionInput::TransportFailed);
            self.dispatch(outbound);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_acceptor();

        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep_interval = interval(self.config.sweep_interval);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started: tick {:?}, liveness timeout {:?}",
            self.config.tick_interval, self.config.liveness_timeout
        );

        loop {
            tokio::select! {
                // Handle connection events
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Push per-player snapshots
                _ = tick_interval.tick() => {
                    self.tick += 1;
                    self.broadcast_snapshots();

                    // Periodic monitoring
                    if self.tick % 300 == 0 {
                        debug!(
                            "Tick {}: {} connections, {} players, {} pipes",
                            self.tick,
                            self.lobby.connection_count(),
                            self.lobby.registry().len(),
                            self.lobby.world().len()
                        );
                    }
                },

                // Evict silent players
                _ = sweep_interval.tick() => {
                    let outbound = self.lobby.sweep(Instant::now());
                    self.dispatch(outbound);
                },
            }
        }

        Ok(())
    }
}

/// Runs one WebSocket connection until either side goes away
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection: ConnectionId,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    queue: usize,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (sender, mut receiver) = mpsc::channel::<Message>(queue);

    if event_tx
        .send(NetworkEvent::Connected {
            connection,
            addr,
            sender,
        })
        .is_err()
    {
        return;
    }

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = receiver.recv().await {
            let closing = matches!(frame, Message::Close(_));
            if let Err(e) = write.send(frame).await {
                debug!("Write to connection {} failed: {}", connection, e);
                break;
            }
            if closing {
                break;
            }
        }
        let _ = write.close().await;
    });

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match shared::decode_client(&text) {
                        Ok(message) => {
                            if event_tx
                                .send(NetworkEvent::MessageReceived { connection, message })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(
                                "Dropping message from connection {} ({}): {}",
                                connection,
                                addr,
                                ServerError::InvalidInput(e)
                            );
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(
                            "Read from connection {} failed: {}",
                            connection,
                            ServerError::Transport(e)
                        );
                        break;
                    }
                }
            },
            _ = &mut writer => break,
        }
    }

    let _ = event_tx.send(NetworkEvent::Disconnected { connection });
    writer.abort();
}
