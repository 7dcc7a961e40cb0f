//! Clip handles
//!
//! A clip is an opaque reference to a piece of music. The scheduler never
//! looks inside it; it only compares handles to decide whether a request
//! would restart the music that is already playing.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque, cheaply clonable clip handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clip(Arc<str>);

impl Clip {
    /// Create a handle from any identifier (usually a file path or asset key)
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Identifier this handle was created from
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Clip {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Clip {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}
