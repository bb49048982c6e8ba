//! # Connection State
//!
//! Per-socket buffers for one accepted connection.
//!
//! Raw socket bytes accumulate in the inbound buffer until the codec reports a
//! complete frame; `take_frame` then splits exactly that frame off the front,
//! leaving any following bytes in place for the next call. Outbound frames are
//! staged with `prepare_send` and flushed with `drain_send_buffer`.

use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::core::codec::{self, FrameCodec, HEADER_LEN};
use crate::core::message::Message;
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::ConnectionId;

/// Initial capacity of the inbound and outbound buffers
const INITIAL_BUFFER_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct ConnectionState {
    id: ConnectionId,
    peer: SocketAddr,
    codec: FrameCodec,
    inbound: BytesMut,
    outbound: BytesMut,
    alive: bool,
}

impl ConnectionState {
    pub fn new(id: ConnectionId, peer: SocketAddr, codec: FrameCodec) -> Self {
        Self {
            id,
            peer,
            codec,
            inbound: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            outbound: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            alive: true,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn mark_closed(&mut self) {
        self.alive = false;
    }

    /// Bytes received but not yet consumed as frames
    pub fn buffered(&self) -> usize {
        self.inbound.len()
    }

    /// Bytes staged but not yet written
    pub fn pending_send(&self) -> usize {
        self.outbound.len()
    }

    pub fn append_received(&mut self, bytes: &[u8]) {
        self.inbound.extend_from_slice(bytes);
    }

    /// Read whatever the socket has available into the inbound buffer.
    ///
    /// End-of-stream marks the connection dead and yields `ConnectionClosed`.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.inbound.reserve(HEADER_LEN);
        let n = reader.read_buf(&mut self.inbound).await?;
        if n == 0 {
            self.mark_closed();
            return Err(ProtocolError::ConnectionClosed);
        }
        trace!(connection = %self.id, bytes = n, total = self.inbound.len(), "Read from socket");
        Ok(n)
    }

    /// Whether a whole frame is buffered. Malformed headers surface as errors.
    pub fn has_complete_frame(&self) -> Result<bool> {
        Ok(self
            .codec
            .frame_len(&self.inbound)?
            .is_some_and(|len| self.inbound.len() >= len))
    }

    /// Remove and return exactly one frame from the front of the inbound buffer.
    pub fn take_frame(&mut self) -> Result<Message> {
        let (message, consumed) = self.codec.decode_slice(&self.inbound)?;
        self.inbound.advance(consumed);
        Ok(message)
    }

    pub fn prepare_send(&mut self, message: &Message) -> Result<()> {
        if message.payload_len() > self.codec.max_payload_size() {
            return Err(ProtocolError::OversizedPacket(message.payload_len()));
        }
        codec::encode(message, &mut self.outbound);
        Ok(())
    }

    /// Write staged bytes until the buffer is empty. Returns the bytes written.
    pub async fn drain_send_buffer<W>(&mut self, writer: &mut W) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0;
        while self.outbound.has_remaining() {
            let n = writer.write_buf(&mut self.outbound).await?;
            if n == 0 {
                self.mark_closed();
                return Err(ProtocolError::ConnectionClosed);
            }
            written += n;
        }
        writer.flush().await?;
        trace!(connection = %self.id, bytes = written, "Drained send buffer");
        Ok(written)
    }
}
