//! Keyspace qualification.
//!
//! The destination clusters do not share the client's `USE` state, so an
//! unqualified table reference is rewritten to `keyspace.table` before the
//! frame is forwarded:
//!
//! ```text
//! INSERT INTO tasks(id, task) VALUES(now(), 'task')
//! INSERT INTO codebase.tasks(id, task) VALUES(now(), 'task')
//! ```
//!
//! The insertion point is the first occurrence of the table name inside the
//! query text. The search has no notion of tokens: a name that also appears
//! earlier inside another identifier, a string literal or a comment is
//! qualified at the wrong place. Exact placement needs a lexical scan of the
//! statement.

use bytes::BytesMut;

use super::layout::StatementLayout;
use super::{guarded, Rejected, Rewritten};
use crate::error::{Result, RewriteError};
use crate::protocol::{grown_body_length, write_body_length};

/// Insert `keyspace.` in front of the first occurrence of `table`.
///
/// Supports QUERY and PREPARE frames, whose body carries the query text.
/// Both the header length and the text's `[long string]` length grow by
/// the insertion size. An empty `keyspace` leaves the frame unchanged.
pub fn qualify_keyspace(
    bytes: BytesMut,
    table: &str,
    keyspace: &str,
) -> std::result::Result<Rewritten, Rejected> {
    guarded(bytes, |bytes| {
        if keyspace.is_empty() {
            return Ok(false);
        }

        let layout = StatementLayout::of(bytes)?;
        let (text, length_offset) = match (layout.text_range(), layout.text_length_offset()) {
            (Some(text), Some(offset)) => (text, offset),
            _ => return Err(RewriteError::UnsupportedOpcode(layout.opcode().as_u8())),
        };

        let index = text.start + find_table(&bytes[text.clone()], table, bytes.len())?;

        let mut insertion = Vec::with_capacity(keyspace.len() + 1);
        insertion.extend_from_slice(keyspace.as_bytes());
        insertion.push(b'.');

        let body_length = grown_body_length(bytes, insertion.len())?;
        let text_length = i32::try_from(text.len() + insertion.len()).map_err(|_| {
            RewriteError::out_of_range(
                format!("query text of {} bytes", text.len() + insertion.len()),
                bytes.len(),
            )
        })?;

        let mut rebuilt = BytesMut::with_capacity(bytes.len() + insertion.len());
        rebuilt.extend_from_slice(&bytes[..index]);
        rebuilt.extend_from_slice(&insertion);
        rebuilt.extend_from_slice(&bytes[index..]);

        write_body_length(&mut rebuilt, body_length)?;
        rebuilt[length_offset..length_offset + 4].copy_from_slice(&text_length.to_be_bytes());

        *bytes = rebuilt;
        Ok(true)
    })
}

/// Offset of the first occurrence of `table` within `text`.
fn find_table(text: &[u8], table: &str, frame_len: usize) -> Result<usize> {
    let needle = table.as_bytes();
    if needle.is_empty() {
        return Err(RewriteError::out_of_range("empty table name", frame_len));
    }
    text.windows(needle.len())
        .position(|window| window == needle)
        .ok_or_else(|| RewriteError::out_of_range(format!("table name `{}`", table), frame_len))
}
