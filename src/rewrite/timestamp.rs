//! Client timestamp injection.
//!
//! Both clusters must resolve the same write with the same cell timestamp,
//! so every mutation is forwarded with an explicit one. A timestamp the
//! client already supplied always wins.

use bytes::{BufMut, BytesMut};

use super::layout::{StatementLayout, PARAMETERS_FLAGS_OFFSET};
use super::{guarded, Rejected, Rewritten};
use crate::error::{Result, RewriteError};
use crate::protocol::{grown_body_length, query_flags, write_body_length};

/// Size of the trailing `[long]` timestamp.
pub const TIMESTAMP_SIZE: usize = 8;

/// Set the timestamp flag and append `timestamp` unless one is present.
///
/// Supports QUERY and EXECUTE frames. Running it twice produces the same
/// bytes as running it once.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use cqlproxy_rewrite::rewrite::inject_timestamp;
///
/// let mut frame = BytesMut::new();
/// frame.extend_from_slice(&[0x04, 0x00, 0x00, 0x01, 0x07, 0x00, 0x00, 0x00, 0x0c]);
/// frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x05]);
/// frame.extend_from_slice(b"USE k");
/// frame.extend_from_slice(&[0x00, 0x01, 0x00]);
///
/// let out = inject_timestamp(frame, 1_700_000_000_000).unwrap();
/// assert!(out.changed);
/// assert_eq!(out.bytes[8], 0x0c + 8);
/// assert_eq!(out.bytes[20], 0x20);
/// ```
pub fn inject_timestamp(
    bytes: BytesMut,
    timestamp: u64,
) -> std::result::Result<Rewritten, Rejected> {
    guarded(bytes, |bytes| {
        let flags_offset = parameters_flags_offset(bytes)?;
        if bytes[flags_offset] & query_flags::DEFAULT_TIMESTAMP != 0 {
            return Ok(false);
        }

        let length = grown_body_length(bytes, TIMESTAMP_SIZE)?;
        write_body_length(bytes, length)?;
        bytes[flags_offset] |= query_flags::DEFAULT_TIMESTAMP;
        bytes.put_u64(timestamp);
        Ok(true)
    })
}

/// Whether the frame already declares a client timestamp.
pub fn has_client_timestamp(bytes: &[u8]) -> Result<bool> {
    let flags_offset = parameters_flags_offset(bytes)?;
    Ok(bytes[flags_offset] & query_flags::DEFAULT_TIMESTAMP != 0)
}

/// Offset of the `<query_parameters>` flags byte, bounds-checked.
fn parameters_flags_offset(bytes: &[u8]) -> Result<usize> {
    let offset = StatementLayout::of(bytes)?.parameters_offset()? + PARAMETERS_FLAGS_OFFSET;
    if offset >= bytes.len() {
        return Err(RewriteError::out_of_range(
            format!("query parameters flags at offset {}", offset),
            bytes.len(),
        ));
    }
    Ok(offset)
}
