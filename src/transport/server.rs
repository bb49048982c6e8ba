//! # Relay Server
//!
//! TCP event loop for the relay.
//!
//! ## Architecture
//! - **Control task**: owns the listener, the protocol [`Engine`] (and with it
//!   the identity registry) and one outbox sender per connection. It
//!   multiplexes `accept`, connection events and shutdown with `tokio::select!`
//!   and never awaits anything else, so registry access needs no locking.
//! - **Connection tasks** (one per socket): own the socket and its
//!   [`ConnectionState`], forward decoded frames to the control task in arrival
//!   order, and are the only writers of their socket. Replies and relayed
//!   frames reach them through a bounded outbox.
//!
//! A failing connection only ends its own task; the control task detaches it
//! from the engine, which releases its identity.
//!
//! ## Backpressure
//! Replies to a connection's own frames travel on a per-connection reply
//! queue. The connection task reserves room on it before forwarding a frame,
//! so a client that pipelines requests is slowed down rather than dropped.
//! Frames relayed from other clients go through the outbox, which holds at
//! most `backpressure_limit` frames. A connection whose outbox is full is
//! closed, and a SEND whose relay could not be queued is answered with NACK
//! instead of ACK.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError, OwnedPermit};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::codec::FrameCodec;
use crate::core::message::{Command, Message};
use crate::error::{ProtocolError, Result};
use crate::protocol::engine::{Delivery, Engine, LinkState};
use crate::protocol::registry::ConnectionId;
use crate::transport::connection::ConnectionState;
use crate::utils::metrics::Metrics;
use crate::utils::timeout::with_timeout;

/// Reply slots reserved per inbound frame: a SEND to oneself produces the
/// relayed frame and the ACK.
const REPLY_SLOTS_PER_FRAME: usize = 2;

/// Events sent from connection tasks to the control task.
enum ConnectionEvent {
    Frame {
        connection: ConnectionId,
        message: Message,
        replies: Vec<OwnedPermit<Message>>,
    },
    Closed {
        connection: ConnectionId,
    },
}

/// A bound relay server, ready to run.
pub struct RelayServer {
    listener: TcpListener,
    config: ServerConfig,
    metrics: Arc<Metrics>,
}

impl RelayServer {
    /// Bind the listening socket described by `config`.
    #[instrument(skip(config), fields(address = %config.address))]
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.address).await?;
        info!(address = %listener.local_addr()?, "Relay listening");
        Ok(Self {
            listener,
            config,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Actual bound address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Run until CTRL+C.
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx_clone.send(()).await;
            }
        });

        let result = self.run_with_shutdown(shutdown_rx).await;
        drop(shutdown_tx);
        result
    }

    /// Run until a value arrives on `shutdown_rx` or its sender is dropped.
    #[instrument(skip_all, fields(address = %self.config.address))]
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let RelayServer {
            listener,
            config,
            metrics,
        } = self;

        let (event_tx, mut event_rx) = mpsc::channel(config.backpressure_limit);
        let mut control = Control::new(config, metrics);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down relay");
                    break;
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => control.accept(stream, peer, &event_tx),
                        Err(e) => {
                            control.metrics.connection_error();
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }

                Some(event) = event_rx.recv() => control.handle_event(event),
            }
        }

        control.shutdown();
        Ok(())
    }
}

/// Bind `config.address` and serve until CTRL+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    RelayServer::bind(config).await?.run().await
}

/// State owned by the control task
struct Control {
    engine: Engine,
    outboxes: HashMap<ConnectionId, mpsc::Sender<Message>>,
    next_id: u64,
    codec: FrameCodec,
    config: ServerConfig,
    metrics: Arc<Metrics>,
}

impl Control {
    fn new(config: ServerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            engine: Engine::new(),
            outboxes: HashMap::new(),
            next_id: 1,
            codec: FrameCodec::new(config.max_payload_size),
            config,
            metrics,
        }
    }

    fn accept(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        events: &mpsc::Sender<ConnectionEvent>,
    ) {
        if self.outboxes.len() >= self.config.max_connections {
            warn!(
                peer = %peer,
                limit = self.config.max_connections,
                "Connection limit reached, dropping connection"
            );
            self.metrics.connection_rejected();
            return;
        }

        let connection = ConnectionId(self.next_id);
        self.next_id += 1;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(%connection, error = %e, "Failed to set TCP_NODELAY");
        }

        let (outbox_tx, outbox_rx) = mpsc::channel(self.config.backpressure_limit);
        self.engine.attach(connection);
        self.outboxes.insert(connection, outbox_tx);
        self.metrics.connection_established();
        info!(%connection, peer = %peer, "Client connected");

        let state = ConnectionState::new(connection, peer, self.codec);
        tokio::spawn(serve_connection(
            stream,
            state,
            events.clone(),
            outbox_rx,
            self.config.backpressure_limit.max(REPLY_SLOTS_PER_FRAME),
            self.metrics.clone(),
            self.config.write_timeout,
        ));
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Frame {
                connection,
                message,
                replies,
            } => self.dispatch(connection, message, replies),
            ConnectionEvent::Closed { connection } => self.release(connection),
        }
    }

    fn dispatch(
        &mut self,
        connection: ConnectionId,
        message: Message,
        mut replies: Vec<OwnedPermit<Message>>,
    ) {
        self.metrics.message_received();
        let command = message.command;

        let deliveries = match self.engine.process(connection, message) {
            Ok(deliveries) => deliveries,
            Err(e) => {
                // Frames can still be queued from a connection we already released
                debug!(%connection, error = %e, "Dropping frame");
                return;
            }
        };

        if command == Command::Hello {
            match self.engine.state(connection) {
                Some(LinkState::Registered(_))
                    if deliveries.iter().any(|d| d.message.command == Command::Ack) =>
                {
                    self.metrics.registration_accepted()
                }
                _ => self.metrics.registration_rejected(),
            }
        }

        // The relay, when there is one, always precedes the sender's ACK
        let mut relay_failed = false;
        for Delivery { to, message } in deliveries {
            let message = match message.command {
                Command::Ack if relay_failed => Message::nack(message.dest, message.message_id),
                _ => message,
            };
            let is_relay = message.command == Command::Send;

            let queued = if to == connection {
                self.reply(&mut replies, to, message)
            } else {
                self.deliver(to, message)
            };
            if is_relay && !queued {
                relay_failed = true;
            }
        }
    }

    /// Queue a frame for the connection whose frame produced it, using a slot
    /// the connection reserved before forwarding.
    fn reply(
        &mut self,
        slots: &mut Vec<OwnedPermit<Message>>,
        to: ConnectionId,
        message: Message,
    ) -> bool {
        match slots.pop() {
            Some(slot) => {
                self.metrics.message_queued(message.command);
                slot.send(message);
                true
            }
            None => self.deliver(to, message),
        }
    }

    /// Queue `message` on the outbox of `to`. Returns whether it was queued.
    fn deliver(&mut self, to: ConnectionId, message: Message) -> bool {
        let Some(outbox) = self.outboxes.get(&to) else {
            return false;
        };

        let command = message.command;
        match outbox.try_send(message) {
            Ok(()) => {
                self.metrics.message_queued(command);
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(connection = %to, "Outbox full, closing slow connection");
                self.metrics.connection_error();
                self.release(to);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.release(to);
                false
            }
        }
    }

    /// Drop the connection's outbox and identity. Idempotent.
    fn release(&mut self, connection: ConnectionId) {
        if self.outboxes.remove(&connection).is_none() {
            return;
        }
        let identity = self.engine.detach(connection);
        self.metrics.connection_closed();
        info!(%connection, identity = ?identity, "Client disconnected");
    }

    fn shutdown(mut self) {
        info!(connections = self.outboxes.len(), "Closing remaining connections");
        let open: Vec<ConnectionId> = self.outboxes.keys().copied().collect();
        for connection in open {
            self.release(connection);
        }
        self.metrics.log_metrics();
    }
}

/// Per-socket task: forward frames in, write replies and relayed frames out.
///
/// A buffered frame is only forwarded once its reply slots are reserved, and
/// nothing more is read from the socket while a frame waits. The reply queue
/// and the outbox keep draining meanwhile.
async fn serve_connection(
    stream: TcpStream,
    mut state: ConnectionState,
    events: mpsc::Sender<ConnectionEvent>,
    mut outbox: mpsc::Receiver<Message>,
    reply_window: usize,
    metrics: Arc<Metrics>,
    write_timeout: Duration,
) {
    let connection = state.id();
    let (mut reader, mut writer) = stream.into_split();
    let (reply_tx, mut replies) = mpsc::channel(reply_window);

    let outcome: Result<()> = async {
        loop {
            let frame_ready = state.has_complete_frame()?;

            tokio::select! {
                read = state.read_from(&mut reader), if !frame_ready => {
                    metrics.bytes_received(read? as u64);
                }

                slots = reserve_reply_slots(&reply_tx), if frame_ready => {
                    let event = ConnectionEvent::Frame {
                        connection,
                        message: state.take_frame()?,
                        replies: slots?,
                    };
                    if events.send(event).await.is_err() {
                        return Ok(());
                    }
                }

                Some(reply) = replies.recv() => {
                    let queues = [&mut replies, &mut outbox];
                    let written = with_timeout(
                        write_timeout,
                        flush_queued(&mut state, reply, queues, &mut writer),
                    )
                    .await??;
                    metrics.bytes_sent(written as u64);
                }

                queued = outbox.recv() => {
                    // Outbox dropped: the control task released this connection
                    let Some(message) = queued else {
                        return Ok(());
                    };
                    let queues = [&mut replies, &mut outbox];
                    let written = with_timeout(
                        write_timeout,
                        flush_queued(&mut state, message, queues, &mut writer),
                    )
                    .await??;
                    metrics.bytes_sent(written as u64);
                }
            }
        }
    }
    .await;

    match outcome {
        Ok(()) => debug!(%connection, "Connection released by server"),
        Err(ProtocolError::ConnectionClosed) => {
            debug!(%connection, peer = %state.peer(), "Peer closed connection")
        }
        Err(e) if e.is_protocol_violation() => {
            metrics.protocol_error();
            warn!(
                %connection,
                peer = %state.peer(),
                error = %e,
                "Protocol violation, closing connection"
            );
        }
        Err(e) => {
            metrics.connection_error();
            warn!(%connection, peer = %state.peer(), error = %e, "Connection failed");
        }
    }

    state.mark_closed();
    let _ = writer.shutdown().await;
    let _ = events.send(ConnectionEvent::Closed { connection }).await;
}

/// Wait for reply-queue room for everything one frame can produce.
async fn reserve_reply_slots(
    replies: &mpsc::Sender<Message>,
) -> Result<Vec<OwnedPermit<Message>>> {
    let mut slots = Vec::with_capacity(REPLY_SLOTS_PER_FRAME);
    for _ in 0..REPLY_SLOTS_PER_FRAME {
        let slot = replies
            .clone()
            .reserve_owned()
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        slots.push(slot);
    }
    Ok(slots)
}

/// Stage `first` and whatever else is already queued, then write it all.
async fn flush_queued<W>(
    state: &mut ConnectionState,
    first: Message,
    queues: [&mut mpsc::Receiver<Message>; 2],
    writer: &mut W,
) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    state.prepare_send(&first)?;
    for queue in queues {
        while let Ok(message) = queue.try_recv() {
            state.prepare_send(&message)?;
        }
    }
    state.drain_send_buffer(writer).await
}
