//! Rewrite configuration.
//!
//! Loaded by the embedding proxy, typically from a JSON section of its own
//! config file:
//!
//! ```
//! use cqlproxy_rewrite::RewriteConfig;
//!
//! let config = RewriteConfig::from_json(r#"{ "qualify_keyspaces": false }"#).unwrap();
//! assert!(config.inject_timestamps);
//! assert!(!config.qualify_keyspaces);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::MAX_BODY_SIZE;

/// Default for [`RewriteConfig::inject_timestamps`].
pub const DEFAULT_INJECT_TIMESTAMPS: bool = true;

/// Default for [`RewriteConfig::qualify_keyspaces`].
pub const DEFAULT_QUALIFY_KEYSPACES: bool = true;

/// Which transformations the rewriter may apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Give mutations an explicit client timestamp.
    pub inject_timestamps: bool,
    /// Qualify unqualified table references with the session keyspace.
    pub qualify_keyspaces: bool,
    /// Largest body accepted from a client stream.
    pub max_body_size: u32,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            inject_timestamps: DEFAULT_INJECT_TIMESTAMPS,
            qualify_keyspaces: DEFAULT_QUALIFY_KEYSPACES,
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

impl RewriteConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
