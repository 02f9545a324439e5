//! # cqlproxy-rewrite
//!
//! In-flight frame rewriting for a dual-write migration proxy speaking the
//! CQL native protocol.
//!
//! A client query is duplicated to two clusters. The bytes the client sent
//! lean on state the second cluster does not have, so before forwarding the
//! proxy makes two things explicit:
//!
//! - **Write timestamp**: mutations get the arrival time as an explicit
//!   client timestamp, so both clusters resolve conflicts identically.
//! - **Keyspace**: unqualified table references get the session keyspace.
//!
//! Every rewrite keeps the header length field (and, for query text, the
//! text length prefix) equal to the bytes actually present, and either
//! applies completely or leaves the frame untouched.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::BytesMut;
//! use cqlproxy_rewrite::protocol::{Frame, Header};
//! use cqlproxy_rewrite::rewrite::{RewriteContext, Rewriter, Table};
//!
//! let text = b"INSERT INTO tasks(id, task) VALUES(now(), 'task')";
//! let mut raw = BytesMut::new();
//! raw.extend_from_slice(&Header::new(0x04, 0, 1, 0x07, 4 + text.len() as u32 + 3).encode());
//! raw.extend_from_slice(&(text.len() as i32).to_be_bytes());
//! raw.extend_from_slice(text);
//! raw.extend_from_slice(&[0x00, 0x01, 0x00]);
//!
//! let frame = Frame::parse(raw)
//!     .unwrap()
//!     .with_table(Arc::new(Table::new("tasks")));
//! let ctx = RewriteContext::new().with_keyspace("codebase");
//!
//! let outcome = Rewriter::default().rewrite(frame, &ctx);
//! assert!(outcome.changed());
//!
//! let bytes = outcome.frame.into_bytes();
//! let needle = b"INSERT INTO codebase.tasks";
//! assert!(bytes.windows(needle.len()).any(|w| w == needle));
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod rewrite;

pub use config::RewriteConfig;
pub use error::{Result, RewriteError};
pub use protocol::{Frame, FrameBuffer};
pub use rewrite::{QueryKind, RewriteContext, RewriteOutcome, Rewriter};
