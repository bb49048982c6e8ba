use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::core::codec::FrameCodec;
use crate::core::message::{Command, Identity, Message};
use crate::error::{ProtocolError, Result};
use crate::utils::timeout::with_timeout;

/// Relay client
///
/// Performs the HELLO handshake, sends SEND frames and matches the server's
/// ACK/NACK replies to requests by message id. SEND frames relayed from other
/// clients that arrive while a reply is awaited are buffered and handed out by
/// [`RelayClient::recv`] in arrival order.
pub struct RelayClient {
    framed: Framed<TcpStream, FrameCodec>,
    identity: Option<Identity>,
    next_message_id: u32,
    response_timeout: Duration,
    inbox: VecDeque<Message>,
}

impl RelayClient {
    /// Connect to a relay server with default client settings
    #[instrument]
    pub async fn connect(addr: &str) -> Result<Self> {
        let config = ClientConfig {
            address: addr.to_string(),
            ..ClientConfig::default()
        };
        Self::connect_with_config(&config).await
    }

    #[instrument(skip(config), fields(address = %config.address))]
    pub async fn connect_with_config(config: &ClientConfig) -> Result<Self> {
        let stream =
            with_timeout(config.connection_timeout, TcpStream::connect(&config.address)).await??;
        stream.set_nodelay(true)?;
        debug!("Connected to relay");

        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new(config.max_payload_size)),
            identity: None,
            next_message_id: 1,
            response_timeout: config.response_timeout,
            inbox: VecDeque::new(),
        })
    }

    /// Identity accepted by the server, if registered
    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }

    /// Register under `identity`.
    ///
    /// A NACK from the server surfaces as [`ProtocolError::DuplicateIdentity`].
    pub async fn hello(&mut self, identity: Identity) -> Result<()> {
        let message_id = self.next_id();
        self.send_frame(Message::hello(identity, message_id)).await?;

        match self.await_reply(message_id).await?.command {
            Command::Ack => {
                debug!(%identity, "Registered with relay");
                self.identity = Some(identity);
                Ok(())
            }
            _ => Err(ProtocolError::DuplicateIdentity(identity)),
        }
    }

    /// Send `payload` to `dest` and wait for the server's verdict.
    ///
    /// Returns the message id used. A NACK surfaces as
    /// [`ProtocolError::UnknownDestination`].
    pub async fn send(&mut self, dest: Identity, payload: impl Into<Bytes>) -> Result<u32> {
        let source = self.identity.ok_or(ProtocolError::UnregisteredSender)?;
        let message_id = self.next_id();
        self.send_frame(Message::send(source, dest, message_id, payload))
            .await?;

        match self.await_reply(message_id).await?.command {
            Command::Ack => Ok(message_id),
            _ => Err(ProtocolError::UnknownDestination(dest)),
        }
    }

    /// Write one frame without waiting for a reply
    pub async fn send_frame(&mut self, message: Message) -> Result<()> {
        self.framed.send(message).await
    }

    /// Next frame not consumed as a reply, buffered ones first
    pub async fn recv(&mut self) -> Result<Message> {
        if let Some(message) = self.inbox.pop_front() {
            return Ok(message);
        }
        self.next_frame().await
    }

    pub async fn recv_timeout(&mut self, duration: Duration) -> Result<Message> {
        with_timeout(duration, self.recv()).await?
    }

    /// Flush pending frames and shut the connection down
    pub async fn close(mut self) -> Result<()> {
        self.framed.close().await
    }

    async fn next_frame(&mut self) -> Result<Message> {
        match self.framed.next().await {
            Some(frame) => frame,
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    async fn await_reply(&mut self, message_id: u32) -> Result<Message> {
        let response_timeout = self.response_timeout;
        with_timeout(response_timeout, async {
            loop {
                let message = self.next_frame().await?;
                let is_reply = message.source.is_server()
                    && matches!(message.command, Command::Ack | Command::Nack)
                    && message.message_id == message_id;
                if is_reply {
                    return Ok(message);
                }
                self.inbox.push_back(message);
            }
        })
        .await?
    }
}
