//! Framed handshake messages over a TCP stream.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use protocol::{Envelope, Frame, FrameCodec, HandshakeMessage, ProtocolError};

/// Read chunk size for the receive buffer.
const READ_CHUNK: usize = 4096;

/// A TCP stream carrying framed, MessagePack-encoded handshake messages.
///
/// Both ends of the handshake use this type; it owns a receive buffer so
/// partial frames survive across reads.
pub struct MessageStream {
    stream: TcpStream,
    codec: FrameCodec,
    buffer: Vec<u8>,
}

impl MessageStream {
    /// Wraps a connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            codec: FrameCodec::new(),
            buffer: Vec::new(),
        }
    }

    /// Sends one handshake message.
    pub async fn send(&mut self, message: HandshakeMessage) -> protocol::Result<()> {
        trace!(kind = message.kind(), "sending handshake message");
        let payload = Envelope::new(message).to_msgpack()?;
        let bytes = self.codec.encode(&Frame::new(payload))?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receives the next handshake message, waiting for a complete frame.
    ///
    /// Returns `ConnectionClosed` if the peer hangs up mid-frame or
    /// before sending anything.
    pub async fn recv(&mut self) -> protocol::Result<HandshakeMessage> {
        loop {
            if let Some((frame, consumed)) = self.codec.try_decode(&self.buffer)? {
                self.buffer.drain(..consumed);
                let envelope = Envelope::from_msgpack(&frame.payload)?;
                trace!(kind = envelope.payload.kind(), "received handshake message");
                return Ok(envelope.payload);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let read = self.stream.read(&mut chunk).await?;
            if read == 0 {
                return Err(ProtocolError::ConnectionClosed(
                    "peer closed the connection".to_string(),
                ));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}
