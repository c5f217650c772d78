//! Domain identifier types with validation
//!
//! Newtype wrappers keep entity, group and session identifiers from being
//! mixed up. All three are opaque strings on the wire.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Canonical entity identifier
///
/// Entities produced by aggregation get an identifier derived from their
/// dedup key, so aggregating the same candidates twice yields the same ids.
///
/// # Examples
///
/// ```
/// use pseudonym::domain::ids::EntityId;
///
/// let a = EntityId::from_key("jean dupont");
/// let b = EntityId::from_key("jean dupont");
/// assert_eq!(a, b);
/// assert!(a.as_str().starts_with("ent_"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new EntityId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(EntityId)` if the ID is valid, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Entity ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Derives a stable identifier from a normalized dedup key
    pub fn from_key(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let hex = format!("{digest:x}");
        Self(format!("ent_{}", &hex[..12]))
    }

    /// Returns the entity ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Explicit entity group identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    /// Creates a new GroupId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Group ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Generates a fresh random group identifier
    pub fn generate() -> Self {
        Self(format!("grp_{}", Uuid::new_v4().simple()))
    }

    /// Returns the group ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Session identifier used as the session store key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId from a string
    ///
    /// Session ids end up in file names, so only ASCII alphanumerics,
    /// `-` and `_` are accepted.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Session ID cannot be empty".to_string());
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!("Invalid session ID: {id}"));
        }
        Ok(Self(id))
    }

    /// Generates a fresh random session identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the session ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_id_traits {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_id_traits!(EntityId);
impl_id_traits!(GroupId);
impl_id_traits!(SessionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_validation() {
        assert!(EntityId::new("ent_1").is_ok());
        assert!(EntityId::new("").is_err());
        assert!(EntityId::new("   ").is_err());
    }

    #[test]
    fn test_entity_id_from_key_is_stable() {
        let a = EntityId::from_key("paris");
        let b = EntityId::from_key("paris");
        let c = EntityId::from_key("lyon");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), "ent_".len() + 12);
    }

    #[test]
    fn test_group_ids_are_unique() {
        assert_ne!(GroupId::generate(), GroupId::generate());
    }

    #[test]
    fn test_session_id_rejects_path_characters() {
        assert!(SessionId::new("abc-123_x").is_ok());
        assert!(SessionId::new("../etc/passwd").is_err());
        assert!(SessionId::new("a b").is_err());
    }

    #[test]
    fn test_serde_rejects_empty_id() {
        let result: Result<EntityId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());

        let id: EntityId = serde_json::from_str("\"ent_abc\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ent_abc\"");
    }

    #[test]
    fn test_from_str_and_display() {
        let id = SessionId::from_str("session-1").unwrap();
        assert_eq!(id.to_string(), "session-1");
        assert_eq!(id.as_ref(), "session-1");
    }
}
