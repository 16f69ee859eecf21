//! Scope key definitions and parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Typed audience identifiers.
///
/// The string form (`user:<id>`, `org:<id>`, `room:<name>`) is the topic
/// name used by brokers and the key of the channel registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ScopeKey {
    /// Events addressed to one user.
    User(String),
    /// Events addressed to everyone in an organization.
    Organization(String),
    /// Events addressed to a collaboration room.
    Room(String),
}

impl ScopeKey {
    /// Parses a scope string into a typed key.
    pub fn parse(scope: &str) -> Option<Self> {
        let (prefix, id) = scope.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        match prefix {
            "user" => Some(Self::User(id.to_string())),
            "org" => Some(Self::Organization(id.to_string())),
            "room" => Some(Self::Room(id.to_string())),
            _ => None,
        }
    }

    /// Converts back to the topic string.
    pub fn to_channel_name(&self) -> String {
        self.to_string()
    }

    /// The identifier part of the key.
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Organization(id) | Self::Room(id) => id,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Organization(id) => write!(f, "org:{id}"),
            Self::Room(name) => write!(f, "room:{name}"),
        }
    }
}

impl FromStr for ScopeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid scope key: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_prefixes() {
        assert_eq!(ScopeKey::parse("user:u1"), Some(ScopeKey::User("u1".into())));
        assert_eq!(
            ScopeKey::parse("org:42"),
            Some(ScopeKey::Organization("42".into()))
        );
        assert_eq!(
            ScopeKey::parse("room:board:7"),
            Some(ScopeKey::Room("board:7".into()))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_or_empty() {
        assert_eq!(ScopeKey::parse("team:1"), None);
        assert_eq!(ScopeKey::parse("org:"), None);
        assert_eq!(ScopeKey::parse("org"), None);
    }

    #[test]
    fn test_display_matches_parse() {
        let key = ScopeKey::Organization("42".into());
        assert_eq!(key.to_channel_name(), "org:42");
        assert_eq!("org:42".parse::<ScopeKey>().unwrap(), key);
    }
}
