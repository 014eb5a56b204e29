//! Identity types

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Avatar identity - the addressing key of a streaming session
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvatarId(Arc<str>);

impl AvatarId {
    #[inline]
    pub fn new(id: impl AsRef<str>) -> Self {
        AvatarId(Arc::from(id.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AvatarId {
    fn from(id: &str) -> Self {
        AvatarId::new(id)
    }
}

impl From<String> for AvatarId {
    fn from(id: String) -> Self {
        AvatarId::new(id)
    }
}

impl fmt::Debug for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Avatar({})", self.0)
    }
}

impl fmt::Display for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
