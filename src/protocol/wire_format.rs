//! Wire format encoding and decoding.
//!
//! Implements the 9-byte native protocol header:
//! ```text
//! ┌─────────┬───────┬──────────┬────────┬──────────┐
//! │ Version │ Flags │ Stream   │ Opcode │ Length   │
//! │ 1 byte  │ 1 byte│ 2 bytes  │ 1 byte │ 4 bytes  │
//! │         │       │ uint16 BE│        │ uint32 BE│
//! └─────────┴───────┴──────────┴────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. `Length` counts every byte
//! after the header.

use crate::error::{Result, RewriteError};

/// Header size in bytes (fixed, exactly 9).
pub const HEADER_SIZE: usize = 9;

/// Offset of the stream id within the header.
pub const STREAM_OFFSET: usize = 2;

/// Offset of the opcode within the header.
pub const OPCODE_OFFSET: usize = 4;

/// Offset of the body length field within the header.
pub const LENGTH_OFFSET: usize = 5;

/// Maximum body size accepted by the protocol (256 MiB).
pub const MAX_BODY_SIZE: u32 = 256 * 1024 * 1024;

/// Flag constants for the protocol.
pub mod flags {
    /// Body is compressed with the negotiated algorithm.
    pub const COMPRESSION: u8 = 0x01;
    /// Request tracing.
    pub const TRACING: u8 = 0x02;
    /// A `[bytes map]` custom payload precedes the body.
    pub const CUSTOM_PAYLOAD: u8 = 0x04;
    /// Response carries warnings.
    pub const WARNING: u8 = 0x08;
    /// Beta protocol version in use.
    pub const USE_BETA: u8 = 0x10;

    /// Flags that shift or hide the body layout.
    pub const OPAQUE_BODY: u8 = COMPRESSION | CUSTOM_PAYLOAD;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Flags byte of the `<query_parameters>` region.
pub mod query_flags {
    pub const VALUES: u8 = 0x01;
    pub const SKIP_METADATA: u8 = 0x02;
    pub const PAGE_SIZE: u8 = 0x04;
    pub const WITH_PAGING_STATE: u8 = 0x08;
    pub const WITH_SERIAL_CONSISTENCY: u8 = 0x10;
    /// An 8-byte client timestamp trails the parameters.
    pub const DEFAULT_TIMESTAMP: u8 = 0x20;
    pub const WITH_NAMES_FOR_VALUES: u8 = 0x40;
}

/// Request opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Startup,
    Options,
    Query,
    Prepare,
    Execute,
    Register,
    Batch,
    AuthResponse,
}

impl Opcode {
    /// Map a raw opcode byte, `None` for anything that is not a request.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Opcode::Startup),
            0x05 => Some(Opcode::Options),
            0x07 => Some(Opcode::Query),
            0x09 => Some(Opcode::Prepare),
            0x0a => Some(Opcode::Execute),
            0x0b => Some(Opcode::Register),
            0x0d => Some(Opcode::Batch),
            0x0f => Some(Opcode::AuthResponse),
            _ => None,
        }
    }

    /// Raw opcode byte.
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Startup => 0x01,
            Opcode::Options => 0x05,
            Opcode::Query => 0x07,
            Opcode::Prepare => 0x09,
            Opcode::Execute => 0x0a,
            Opcode::Register => 0x0b,
            Opcode::Batch => 0x0d,
            Opcode::AuthResponse => 0x0f,
        }
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version (high bit set on responses).
    pub version: u8,
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Client-assigned stream id, echoed on the response.
    pub stream: u16,
    /// Raw opcode byte.
    pub opcode: u8,
    /// Body length in bytes.
    pub length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(version: u8, flags: u8, stream: u16, opcode: u8, length: u32) -> Self {
        Self {
            version,
            flags,
            stream,
            opcode,
            length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use cqlproxy_rewrite::protocol::Header;
    ///
    /// let header = Header::new(0x04, 0, 7, 0x07, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 9);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (9 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = self.version;
        buf[1] = self.flags;
        buf[2..4].copy_from_slice(&self.stream.to_be_bytes());
        buf[4] = self.opcode;
        buf[5..9].copy_from_slice(&self.length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use cqlproxy_rewrite::protocol::Header;
    ///
    /// let bytes = [0x04, 0, 0, 42, 0x07, 0, 0, 0, 100];
    /// let header = Header::decode(&bytes).unwrap();
    /// assert_eq!(header.stream, 42);
    /// assert_eq!(header.length, 100);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            version: buf[0],
            flags: buf[1],
            stream: u16::from_be_bytes([buf[2], buf[3]]),
            opcode: buf[4],
            length: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
        })
    }

    /// Typed opcode, if it is a known request opcode.
    #[inline]
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    /// Check if the body is compressed.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        flags::has_flag(self.flags, flags::COMPRESSION)
    }

    /// Check if a custom payload precedes the body.
    #[inline]
    pub fn has_custom_payload(&self) -> bool {
        flags::has_flag(self.flags, flags::CUSTOM_PAYLOAD)
    }
}

/// Read a big-endian `u16` at `offset`.
pub fn read_u16_at(bytes: &[u8], offset: usize) -> Result<u16> {
    match offset.checked_add(2).and_then(|end| bytes.get(offset..end)) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => Err(RewriteError::out_of_range(
            format!("[short] at offset {}", offset),
            bytes.len(),
        )),
    }
}

/// Read a big-endian `i32` at `offset`.
pub fn read_i32_at(bytes: &[u8], offset: usize) -> Result<i32> {
    match offset.checked_add(4).and_then(|end| bytes.get(offset..end)) {
        Some(b) => Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(RewriteError::out_of_range(
            format!("[int] at offset {}", offset),
            bytes.len(),
        )),
    }
}

/// Read the body length field of a raw frame.
pub fn read_body_length(bytes: &[u8]) -> Result<u32> {
    if bytes.len() < HEADER_SIZE {
        return Err(RewriteError::MalformedFrame {
            len: bytes.len(),
            reason: "shorter than header",
        });
    }
    let b = &bytes[LENGTH_OFFSET..HEADER_SIZE];
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Overwrite the body length field of a raw frame.
pub fn write_body_length(bytes: &mut [u8], length: u32) -> Result<()> {
    if bytes.len() < HEADER_SIZE {
        return Err(RewriteError::MalformedFrame {
            len: bytes.len(),
            reason: "shorter than header",
        });
    }
    bytes[LENGTH_OFFSET..HEADER_SIZE].copy_from_slice(&length.to_be_bytes());
    Ok(())
}

/// Compute the body length after growing by `delta` bytes.
///
/// Does not write; callers check first and commit with [`write_body_length`]
/// once every other bound has been validated.
pub fn grown_body_length(bytes: &[u8], delta: usize) -> Result<u32> {
    let current = read_body_length(bytes)?;
    u32::try_from(delta)
        .ok()
        .and_then(|d| current.checked_add(d))
        .ok_or_else(|| {
            RewriteError::out_of_range(
                format!("body length {} + {}", current, delta),
                bytes.len(),
            )
        })
}

/// Check that the length field matches the bytes actually present.
pub fn validate_body_length(bytes: &[u8]) -> Result<()> {
    let declared = read_body_length(bytes)? as usize;
    if declared != bytes.len() - HEADER_SIZE {
        return Err(RewriteError::MalformedFrame {
            len: bytes.len(),
            reason: "length field disagrees with body",
        });
    }
    Ok(())
}
