use crate::error::ShortenerError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identity of the anonymous user that owns a set of short links.
///
/// The value is opaque to the engine; transports derive it from whatever
/// authenticated token they carry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates an owner id, rejecting blank values.
    pub fn new(id: impl Into<String>) -> std::result::Result<Self, ShortenerError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ShortenerError::InvalidInput(
                "owner id cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Creates an owner id without validation.
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_ids() {
        assert!(OwnerId::new("").is_err());
        assert!(OwnerId::new("   ").is_err());
        assert_eq!(OwnerId::new("u1").unwrap().as_str(), "u1");
    }
}
