//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 9 bytes
//! - `WaitingForBody`: Header parsed, need N more body bytes
//!
//! Each extracted frame keeps its header, ready for [`Frame::parse`].
//!
//! # Example
//!
//! ```
//! use cqlproxy_rewrite::protocol::{Frame, FrameBuffer, Header};
//!
//! let mut raw = Header::new(0x04, 0, 1, 0x05, 0).encode().to_vec(); // OPTIONS
//! raw.extend_from_slice(&Header::new(0x04, 0, 2, 0x05, 0).encode());
//!
//! let mut buffer = FrameBuffer::new();
//! let frames = buffer.push(&raw[..13]).unwrap();
//! assert_eq!(frames.len(), 1);
//!
//! let frames = buffer.push(&raw[13..]).unwrap();
//! let frame = Frame::parse(frames.into_iter().next().unwrap()).unwrap();
//! assert_eq!(frame.stream(), 2);
//! ```
//!
//! [`Frame::parse`]: super::Frame::parse

use bytes::BytesMut;

use super::wire_format::{Header, HEADER_SIZE, MAX_BODY_SIZE};
use crate::config::RewriteConfig;
use crate::error::{Result, RewriteError};

/// State machine for frame splitting.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for complete header (need 9 bytes).
    WaitingForHeader,
    /// Header seen, waiting until `total` bytes (header included) are buffered.
    WaitingForBody { total: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// All data is stored in a single `BytesMut` buffer; extracted frames are
/// split off it without copying.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed body size.
    max_body_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max body: 256MB.
    pub fn new() -> Self {
        Self::with_max_body(MAX_BODY_SIZE)
    }

    /// Create a new frame buffer with custom max body size.
    pub fn with_max_body(max_body_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_body_size,
        }
    }

    /// Create a frame buffer bounded by `config.max_body_size`.
    pub fn from_config(config: &RewriteConfig) -> Self {
        Self::with_max_body(config.max_body_size)
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns raw frames (header included). Partial data is kept for the
    /// next push.
    ///
    /// # Errors
    ///
    /// Returns `FrameTooLarge` if a header declares a body above the limit.
    /// The stream cannot be resynchronised after that; callers close it.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<BytesMut>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<BytesMut>> {
        let total = match self.state {
            State::WaitingForHeader => {
                let Some(header) = Header::decode(&self.buffer) else {
                    return Ok(None);
                };
                if header.length > self.max_body_size {
                    return Err(RewriteError::FrameTooLarge {
                        len: header.length,
                        max: self.max_body_size,
                    });
                }
                let total = HEADER_SIZE + header.length as usize;
                self.state = State::WaitingForBody { total };
                total
            }
            State::WaitingForBody { total } => total,
        };

        if self.buffer.len() < total {
            return Ok(None);
        }

        self.state = State::WaitingForHeader;
        Ok(Some(self.buffer.split_to(total)))
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::test_support::{frame_bytes, query_frame};

    fn stream_of(frame: &[u8]) -> u16 {
        Header::decode(frame).unwrap().stream
    }

    fn with_stream(mut frame: Vec<u8>, stream: u16) -> Vec<u8> {
        frame[2..4].copy_from_slice(&stream.to_be_bytes());
        frame
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let raw = query_frame("SELECT * FROM tasks", 0x00);

        let frames = buffer.push(&raw).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &raw[..]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = Vec::new();
        for stream in 1..=3u16 {
            combined.extend(with_stream(query_frame("SELECT 1", 0x00), stream));
        }

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(stream_of(&frames[0]), 1);
        assert_eq!(stream_of(&frames[1]), 2);
        assert_eq!(stream_of(&frames[2]), 3);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let raw = query_frame("SELECT 1", 0x00);

        assert!(buffer.push(&raw[..5]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        let frames = buffer.push(&raw[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_body() {
        let mut buffer = FrameBuffer::new();
        let raw = query_frame("INSERT INTO tasks(id, task) VALUES(now(), 'a longer task')", 0x00);

        let partial = HEADER_SIZE + 10;
        assert!(buffer.push(&raw[..partial]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForBody");

        let frames = buffer.push(&raw[partial..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &raw[..]);
    }

    #[test]
    fn test_empty_body() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&frame_bytes(0x05, 0x00, &[])).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), HEADER_SIZE);
    }

    #[test]
    fn test_max_body_validation() {
        let mut buffer = FrameBuffer::with_max_body(100);
        let header = Header::new(0x04, 0, 1, 0x07, 1000).encode();

        let err = buffer.push(&header).unwrap_err();
        assert!(matches!(err, RewriteError::FrameTooLarge { len: 1000, max: 100 }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_max_body_from_config() {
        let config = RewriteConfig {
            max_body_size: 16,
            ..RewriteConfig::default()
        };
        let mut buffer = FrameBuffer::from_config(&config);

        let frames = buffer.push(&query_frame("USE ks", 0x00)).unwrap();
        assert_eq!(frames.len(), 1);

        let err = buffer
            .push(&query_frame("SELECT * FROM tasks", 0x00))
            .unwrap_err();
        assert!(matches!(err, RewriteError::FrameTooLarge { max: 16, .. }));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let raw = query_frame("SELECT 1", 0x00);

        buffer.push(&raw[..HEADER_SIZE]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForBody");
        assert_eq!(buffer.len(), HEADER_SIZE);

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let raw = query_frame("USE codebase", 0x00);

        let mut all_frames = Vec::new();
        for byte in &raw {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(&all_frames[0][..], &raw[..]);
    }
}
