//! Frame codec for the loopback handshake connection.
//!
//! # Frame Format
//!
//! Each frame consists of:
//! - 4 bytes: magic bytes "SLNC"
//! - 4 bytes: content length (big-endian, includes flags byte)
//! - 1 byte: flags (bit 0 = compressed)
//! - N bytes: payload (possibly LZ4 compressed)
//!
//! Handshake messages are usually tiny, but a directory grant can carry
//! many descriptors and an app icon is an arbitrary blob, so payloads
//! above 1 KiB are LZ4-compressed. The maximum frame size bounds what an
//! untrusted peer can make the Launcher buffer.

use crate::error::{ProtocolError, Result};

/// Magic bytes identifying a SafeLauncher handshake frame.
pub const FRAME_MAGIC: [u8; 4] = *b"SLNC";

/// Compression threshold in bytes. Payloads larger than this are compressed.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// Maximum frame size (4 MB). The handshake never legitimately needs more.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Frame header size: 4 (magic) + 4 (length) + 1 (flags) = 9 bytes.
pub const FRAME_HEADER_SIZE: usize = 9;

/// Flags indicating frame properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Flag indicating the payload is LZ4 compressed.
    pub const COMPRESSED: u8 = 0b0000_0001;

    /// Create a new empty flags set.
    #[inline]
    pub fn new() -> Self {
        Self(0)
    }

    /// Create flags from a raw byte value.
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Get the raw byte value of the flags.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Check if the compressed flag is set.
    #[inline]
    pub fn is_compressed(self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    /// Return a new flags with compressed set.
    #[inline]
    pub fn with_compressed(mut self, compressed: bool) -> Self {
        if compressed {
            self.0 |= Self::COMPRESSED;
        } else {
            self.0 &= !Self::COMPRESSED;
        }
        self
    }
}

/// A frame containing a header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame flags.
    pub flags: FrameFlags,
    /// The payload data (uncompressed form).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given payload.
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            flags: FrameFlags::new(),
            payload,
        }
    }
}

/// Encoder and decoder for frames.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    compression_enabled: bool,
}

impl FrameCodec {
    /// Create a new frame codec with compression enabled.
    pub fn new() -> Self {
        Self {
            compression_enabled: true,
        }
    }

    /// Create a new frame codec with compression disabled.
    pub fn without_compression() -> Self {
        Self {
            compression_enabled: false,
        }
    }

    /// Encode a frame into bytes.
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        let payload = &frame.payload;

        if payload.len() > MAX_FRAME_SIZE - FRAME_HEADER_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len() + FRAME_HEADER_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }

        let should_compress = self.compression_enabled && payload.len() > COMPRESSION_THRESHOLD;

        let (encoded_payload, flags) = if should_compress {
            let compressed = lz4_flex::compress_prepend_size(payload);
            // Only use compression if it actually reduces size
            if compressed.len() < payload.len() {
                (compressed, FrameFlags::new().with_compressed(true))
            } else {
                (payload.clone(), frame.flags)
            }
        } else {
            (payload.clone(), frame.flags)
        };

        // flags byte + payload
        let content_len = 1 + encoded_payload.len();

        let mut output = Vec::with_capacity(FRAME_HEADER_SIZE + encoded_payload.len());
        output.extend_from_slice(&FRAME_MAGIC);
        output.extend_from_slice(&(content_len as u32).to_be_bytes());
        output.push(flags.as_byte());
        output.extend_from_slice(&encoded_payload);

        Ok(output)
    }

    /// Decode a frame from bytes.
    ///
    /// Returns the decoded frame and the number of bytes consumed.
    pub fn decode(&self, data: &[u8]) -> Result<(Frame, usize)> {
        let content_len = match self.decode_header(data)? {
            Some(len) => len,
            None => {
                return Err(ProtocolError::Deserialization(format!(
                    "insufficient data for frame: have {} bytes",
                    data.len()
                )))
            }
        };

        // Content must have at least the flags byte
        if content_len < 1 {
            return Err(ProtocolError::Deserialization(
                "invalid frame: content length must be at least 1 for flags byte".to_string(),
            ));
        }

        let flags = FrameFlags::from_byte(data[8]);
        let payload_data = &data[9..8 + content_len];

        let payload = if flags.is_compressed() {
            lz4_flex::decompress_size_prepended(payload_data).map_err(|e| {
                ProtocolError::Deserialization(format!("failed to decompress payload: {}", e))
            })?
        } else {
            payload_data.to_vec()
        };

        let frame = Frame {
            // Clear compression flag since payload is now decompressed
            flags: FrameFlags::new(),
            payload,
        };

        Ok((frame, 8 + content_len))
    }

    /// Try to decode a frame from bytes, returning `None` if there isn't
    /// enough data yet. Used for streaming reads of partial frames.
    pub fn try_decode(&self, data: &[u8]) -> Result<Option<(Frame, usize)>> {
        match self.decode_header(data)? {
            Some(_) => self.decode(data).map(Some),
            None => Ok(None),
        }
    }

    /// Validate magic and length; returns the content length when the full
    /// frame is available, `None` when more data is needed.
    fn decode_header(&self, data: &[u8]) -> Result<Option<usize>> {
        if data.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let magic = &data[0..4];
        if magic != FRAME_MAGIC {
            let expected = u32::from_be_bytes(FRAME_MAGIC);
            let got = u32::from_be_bytes([magic[0], magic[1], magic[2], magic[3]]);
            return Err(ProtocolError::Deserialization(format!(
                "invalid frame magic: expected 0x{:08x} (SLNC), got 0x{:08x}",
                expected, got
            )));
        }

        let length_bytes: [u8; 4] = data[4..8].try_into().expect("slice is 4 bytes");
        let content_len = u32::from_be_bytes(length_bytes) as usize;

        let total_frame_size = 8 + content_len;
        if total_frame_size > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: total_frame_size,
                max: MAX_FRAME_SIZE,
            });
        }

        if data.len() < total_frame_size {
            return Ok(None);
        }

        Ok(Some(content_len))
    }
}
