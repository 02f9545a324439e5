//! Per-request facts resolved outside the engine.
//!
//! The session tracker knows the client's current keyspace, the statement
//! resolver knows whether the table reference was already qualified, and the
//! prepared-statement cache knows what an EXECUTE will run.

use super::QueryKind;

/// Context handed to [`Rewriter::plan`](super::Rewriter::plan).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteContext {
    keyspace: Option<String>,
    table_qualified: bool,
    prepared_kind: Option<QueryKind>,
}

impl RewriteContext {
    /// Context with no session keyspace and an unqualified table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current keyspace of the client session.
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// Whether the statement already names its keyspace.
    pub fn with_table_qualified(mut self, qualified: bool) -> Self {
        self.table_qualified = qualified;
        self
    }

    /// Kind of the statement behind an EXECUTE's prepared id.
    pub fn with_prepared_kind(mut self, kind: QueryKind) -> Self {
        self.prepared_kind = Some(kind);
        self
    }

    #[inline]
    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    #[inline]
    pub fn table_qualified(&self) -> bool {
        self.table_qualified
    }

    #[inline]
    pub fn prepared_kind(&self) -> Option<QueryKind> {
        self.prepared_kind
    }
}
