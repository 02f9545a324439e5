//! Rewrite module - classification and in-flight frame mutation.
//!
//! Every transformation takes ownership of a raw frame and hands it back:
//! - `Ok(Rewritten)` with the (possibly) mutated bytes
//! - `Err(Rejected)` with the original bytes, untouched, and the reason
//!
//! Transformations run all of their bounds checks before the first write,
//! and grow the 4-byte body length field together with every insertion.

mod classify;
mod context;
mod keyspace;
mod layout;
mod pipeline;
mod table;
mod timestamp;

use bytes::BytesMut;
use thiserror::Error;

use crate::error::{Result, RewriteError};

pub use classify::{classify, classify_text, QueryKind};
pub use context::RewriteContext;
pub use keyspace::qualify_keyspace;
pub use layout::{StatementLayout, PARAMETERS_FLAGS_OFFSET};
pub use pipeline::{RewriteOutcome, RewritePlan, Rewriter, StepStatus};
pub use table::{Table, TableDescriptor};
pub use timestamp::{has_client_timestamp, inject_timestamp, TIMESTAMP_SIZE};

/// Frame bytes after a successful transformation.
#[derive(Debug)]
pub struct Rewritten {
    /// Frame bytes, header included.
    pub bytes: BytesMut,
    /// Whether any byte changed.
    pub changed: bool,
}

/// Frame bytes handed back unmodified after a failed transformation.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejected {
    /// Original frame bytes.
    pub bytes: BytesMut,
    /// Why the transformation was skipped.
    #[source]
    pub error: RewriteError,
}

impl Rejected {
    /// Split into the original bytes and the error.
    pub fn into_parts(self) -> (BytesMut, RewriteError) {
        (self.bytes, self.error)
    }
}

/// Run `apply` against owned bytes, returning them either way.
///
/// `apply` must finish every fallible step before its first write.
pub(crate) fn guarded<F>(mut bytes: BytesMut, apply: F) -> std::result::Result<Rewritten, Rejected>
where
    F: FnOnce(&mut BytesMut) -> Result<bool>,
{
    match apply(&mut bytes) {
        Ok(changed) => Ok(Rewritten { bytes, changed }),
        Err(error) => Err(Rejected { bytes, error }),
    }
}
