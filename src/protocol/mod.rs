//! Protocol module - wire format, framing, and the frame model.
//!
//! This module implements the native protocol surface the rewrite pass needs:
//! - 9-byte header encoding/decoding and length helpers
//! - Frame buffer for cutting a byte stream into whole frames
//! - Frame struct owning one request for the duration of a pass

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    flags, grown_body_length, query_flags, read_body_length, read_i32_at, read_u16_at,
    validate_body_length, write_body_length, Header, Opcode, HEADER_SIZE, LENGTH_OFFSET,
    MAX_BODY_SIZE, OPCODE_OFFSET, STREAM_OFFSET,
};
