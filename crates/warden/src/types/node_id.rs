use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a peer node in the server cluster (e.g., "lobby", "survival-2").
///
/// Each peer gets its own replication queue; the transport layer maps the
/// name to whatever endpoint currently serves that node.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
