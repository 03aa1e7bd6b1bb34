use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A backend record id.
///
/// The backend sends ids as JSON numbers in some payloads and as strings in
/// others, so the id is kept in its string form and compared that way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScalarId(String);

/// Id of a query thread.
pub type QueryId = ScalarId;
/// Id of a message inside a query thread.
pub type MessageId = ScalarId;
/// Id of an authenticated user.
pub type UserId = ScalarId;

impl ScalarId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScalarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ScalarId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ScalarId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ScalarId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Serialize for ScalarId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<u64>() {
            Ok(n) if n.to_string() == self.0 => serializer.serialize_u64(n),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ScalarId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n.to_string())),
            Raw::Text(s) => Ok(Self(s)),
        }
    }
}
