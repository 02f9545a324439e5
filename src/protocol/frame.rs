//! Frame model.
//!
//! One inbound client request: the raw bytes plus what the rewrite pass
//! derives from them. The statement kind is fixed at parse time from the
//! unmutated bytes, so later insertions can never change it.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use cqlproxy_rewrite::protocol::{Frame, Header};
//! use cqlproxy_rewrite::rewrite::QueryKind;
//!
//! let text = b"SELECT * FROM tasks";
//! let mut raw = BytesMut::new();
//! raw.extend_from_slice(&Header::new(0x04, 0, 3, 0x07, 4 + text.len() as u32 + 3).encode());
//! raw.extend_from_slice(&(text.len() as i32).to_be_bytes());
//! raw.extend_from_slice(text);
//! raw.extend_from_slice(&[0x00, 0x01, 0x00]);
//!
//! let frame = Frame::parse(raw).unwrap();
//! assert_eq!(frame.stream(), 3);
//! assert_eq!(frame.kind(), QueryKind::Select);
//! ```

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::BytesMut;

use super::wire_format::{
    validate_body_length, Header, Opcode, HEADER_SIZE, OPCODE_OFFSET, STREAM_OFFSET,
};
use crate::error::{Result, RewriteError};
use crate::rewrite::{
    classify, has_client_timestamp, inject_timestamp, qualify_keyspace, QueryKind, Rejected,
    Rewritten, TableDescriptor,
};

/// A client request frame owned by one rewrite pass.
pub struct Frame {
    /// Milliseconds since the epoch, stamped on arrival.
    timestamp: u64,
    stream: u16,
    kind: QueryKind,
    table: Option<Arc<dyn TableDescriptor>>,
    /// Header and body.
    bytes: BytesMut,
}

impl Frame {
    /// Parse raw bytes, stamping the current time.
    pub fn parse(bytes: BytesMut) -> Result<Self> {
        Self::parse_at(bytes, now_millis())
    }

    /// Parse raw bytes with an explicit arrival timestamp.
    ///
    /// Rejects buffers shorter than the header and buffers whose length
    /// field disagrees with the body actually present.
    pub fn parse_at(bytes: BytesMut, timestamp: u64) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(RewriteError::MalformedFrame {
                len: bytes.len(),
                reason: "shorter than header",
            });
        }
        validate_body_length(&bytes)?;

        let stream = u16::from_be_bytes([bytes[STREAM_OFFSET], bytes[STREAM_OFFSET + 1]]);
        let kind = classify(&bytes);

        Ok(Self {
            timestamp,
            stream,
            kind,
            table: None,
            bytes,
        })
    }

    /// Attach the externally resolved table descriptor.
    pub fn with_table(mut self, table: Arc<dyn TableDescriptor>) -> Self {
        self.table = Some(table);
        self
    }

    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[inline]
    pub fn stream(&self) -> u16 {
        self.stream
    }

    #[inline]
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Raw opcode byte.
    #[inline]
    pub fn opcode(&self) -> u8 {
        self.bytes[OPCODE_OFFSET]
    }

    /// Typed opcode, if it is a known request opcode.
    #[inline]
    pub fn typed_opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode())
    }

    /// Decoded header, reflecting any rewrite so far.
    pub fn header(&self) -> Header {
        // parse_at guarantees the header is present.
        Header::decode(&self.bytes).unwrap_or(Header::new(0, 0, self.stream, 0, 0))
    }

    pub fn table(&self) -> Option<&dyn TableDescriptor> {
        self.table.as_deref()
    }

    /// Whether the frame carries a client timestamp (QUERY/EXECUTE only).
    pub fn has_client_timestamp(&self) -> Result<bool> {
        has_client_timestamp(&self.bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hand the bytes to the forwarding layer.
    pub fn into_bytes(self) -> BytesMut {
        self.bytes
    }

    /// Inject the arrival timestamp unless the client supplied one.
    ///
    /// Returns whether the bytes changed. On error the frame is unchanged.
    pub fn inject_timestamp(&mut self) -> Result<bool> {
        let timestamp = self.timestamp;
        self.transform(|bytes| inject_timestamp(bytes, timestamp))
    }

    /// Qualify the attached table with `keyspace`.
    ///
    /// Returns whether the bytes changed. On error the frame is unchanged.
    pub fn qualify_keyspace(&mut self, keyspace: &str) -> Result<bool> {
        let table = match &self.table {
            Some(table) => Arc::clone(table),
            None => {
                return Err(RewriteError::out_of_range(
                    "no table descriptor attached",
                    self.bytes.len(),
                ))
            }
        };
        self.transform(|bytes| qualify_keyspace(bytes, table.name(), keyspace))
    }

    fn transform<F>(&mut self, f: F) -> Result<bool>
    where
        F: FnOnce(BytesMut) -> std::result::Result<Rewritten, Rejected>,
    {
        match f(std::mem::take(&mut self.bytes)) {
            Ok(Rewritten { bytes, changed }) => {
                self.bytes = bytes;
                Ok(changed)
            }
            Err(Rejected { bytes, error }) => {
                self.bytes = bytes;
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("timestamp", &self.timestamp)
            .field("stream", &self.stream)
            .field("kind", &self.kind)
            .field("table", &self.table.as_ref().map(|t| t.name().to_string()))
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::query_flags;
    use crate::rewrite::test_support::{execute_frame, frame_bytes, length_field, query_frame};
    use crate::rewrite::Table;

    fn parse(bytes: &[u8]) -> Frame {
        Frame::parse_at(BytesMut::from(bytes), 1_000).unwrap()
    }

    #[test]
    fn test_parse_reads_stream_and_kind() {
        let mut raw = query_frame("update tasks set a = 1", 0x00);
        raw[2..4].copy_from_slice(&0xBEEFu16.to_be_bytes());

        let frame = parse(&raw);
        assert_eq!(frame.stream(), 0xBEEF);
        assert_eq!(frame.kind(), QueryKind::Update);
        assert_eq!(frame.timestamp(), 1_000);
        assert_eq!(frame.opcode(), 0x07);
        assert_eq!(frame.typed_opcode(), Some(Opcode::Query));
        assert_eq!(frame.as_bytes(), &raw[..]);
        assert!(frame.table().is_none());
    }

    #[test]
    fn test_parse_rejects_short_buffers() {
        for len in 0..HEADER_SIZE {
            let result = Frame::parse_at(BytesMut::from(&[0u8; 9][..len]), 0);
            assert!(matches!(result, Err(RewriteError::MalformedFrame { .. })), "len {}", len);
        }
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        let mut raw = query_frame("SELECT 1", 0x00);
        raw.push(0xFF);
        let err = Frame::parse_at(BytesMut::from(&raw[..]), 0).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_header_only_frame_parses() {
        let frame = parse(&frame_bytes(0x05, 0x00, &[]));
        assert_eq!(frame.kind(), QueryKind::Misc);
        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(frame.header().length, 0);
    }

    #[test]
    fn test_parse_stamps_current_time() {
        let before = now_millis();
        let frame = Frame::parse(BytesMut::from(&query_frame("SELECT 1", 0)[..])).unwrap();
        assert!(frame.timestamp() >= before);
    }

    #[test]
    fn test_inject_timestamp_uses_arrival_time() {
        let mut frame = parse(&query_frame("INSERT INTO t(a) VALUES(1)", 0x00));
        assert!(!frame.has_client_timestamp().unwrap());

        assert!(frame.inject_timestamp().unwrap());
        assert!(frame.has_client_timestamp().unwrap());
        assert_eq!(&frame.as_bytes()[frame.len() - 8..], &1_000u64.to_be_bytes());
        assert_eq!(frame.header().length as usize, frame.len() - HEADER_SIZE);

        // Second pass is a no-op.
        let snapshot = frame.as_bytes().to_vec();
        assert!(!frame.inject_timestamp().unwrap());
        assert_eq!(frame.as_bytes(), &snapshot[..]);
    }

    #[test]
    fn test_kind_survives_rewrites() {
        let mut frame = parse(&query_frame("DELETE FROM tasks WHERE id = 1", 0x00))
            .with_table(Arc::new(Table::new("tasks")));
        frame.inject_timestamp().unwrap();
        frame.qualify_keyspace("codebase").unwrap();

        assert_eq!(frame.kind(), QueryKind::Delete);
        assert_eq!(length_field(frame.as_bytes()), frame.len() - HEADER_SIZE);
    }

    #[test]
    fn test_failed_transform_restores_bytes() {
        let raw = query_frame("SELECT * FROM events", query_flags::VALUES);
        let mut frame = parse(&raw).with_table(Arc::new(Table::new("tasks")));

        let err = frame.qualify_keyspace("codebase").unwrap_err();
        assert!(matches!(err, RewriteError::OffsetOutOfRange { .. }));
        assert_eq!(frame.as_bytes(), &raw[..]);
    }

    #[test]
    fn test_qualify_without_table() {
        let raw = query_frame("SELECT * FROM tasks", 0x00);
        let mut frame = parse(&raw);
        assert!(frame.qualify_keyspace("codebase").is_err());
        assert_eq!(frame.into_bytes(), BytesMut::from(&raw[..]));
    }

    #[test]
    fn test_execute_frame() {
        let frame = parse(&execute_frame(&[7; 16], query_flags::DEFAULT_TIMESTAMP));
        assert_eq!(frame.kind(), QueryKind::Misc);
        assert!(frame.has_client_timestamp().unwrap());
        assert!(format!("{:?}", frame).contains("Misc"));
    }
}
