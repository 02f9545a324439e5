//! Table descriptor capability.
//!
//! Table metadata is resolved outside this crate (query parsing or the
//! prepared-statement cache). The engine only ever asks for the bare name.

/// Anything that can name the table a statement targets.
pub trait TableDescriptor: Send + Sync {
    /// Bare table name, exactly as it appears in the query text.
    fn name(&self) -> &str;

    /// Home keyspace of the table, when the resolver knows it.
    fn keyspace(&self) -> Option<&str> {
        None
    }
}

/// Plain owned descriptor for callers without their own metadata type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub keyspace: Option<String>,
    pub name: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            keyspace: None,
            name: name.into(),
        }
    }

    pub fn in_keyspace(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            keyspace: Some(keyspace.into()),
            name: name.into(),
        }
    }
}

impl TableDescriptor for Table {
    fn name(&self) -> &str {
        &self.name
    }

    fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }
}
