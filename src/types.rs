//! Wire enums and small value types shared by the entities.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Who can see a status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    /// Convert to form/query value
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
            Visibility::Direct => "direct",
        }
    }
}

/// Kind of a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Mention,
    Reblog,
    Favourite,
    Follow,
}

/// Kind of a media attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentType {
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "gifv")]
    GifVideo,
    #[serde(rename = "unknown")]
    Unknown,
}

/// OAuth scope set.
///
/// Serialized as the space-separated form the API uses, e.g. `"read write"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    pub read: bool,
    pub write: bool,
    pub follow: bool,
}

impl Scope {
    /// Every scope.
    pub const ALL: Scope = Scope {
        read: true,
        write: true,
        follow: true,
    };

    /// Parse the space-separated form. Unknown tokens are ignored.
    pub fn parse(s: &str) -> Self {
        let mut scope = Scope::default();
        for token in s.split_whitespace() {
            match token {
                "read" => scope.read = true,
                "write" => scope.write = true,
                "follow" => scope.follow = true,
                _ => {}
            }
        }
        scope
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens = [
            (self.read, "read"),
            (self.write, "write"),
            (self.follow, "follow"),
        ];
        let joined = tokens
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&joined)
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Scope::parse(&s))
    }
}

/// Options for serializing entities for local persistence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Also write the fields the API never sends (`host`, `scope`).
    pub include_host_and_scope: bool,
}

impl SerializeOptions {
    /// Options that keep every locally known field.
    pub fn persisted() -> Self {
        Self {
            include_host_and_scope: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_round_trips_through_text() {
        let scope = Scope::parse("read  follow bogus");
        assert!(scope.read && scope.follow && !scope.write);
        assert_eq!(scope.to_string(), "read follow");
        assert_eq!(Scope::ALL.to_string(), "read write follow");
        assert_eq!(Scope::default().to_string(), "");
    }

    #[test]
    fn enums_use_wire_names() {
        let v: AttachmentType = serde_json::from_str("\"gifv\"").unwrap();
        assert_eq!(v, AttachmentType::GifVideo);
        let n: NotificationType = serde_json::from_str("\"favourite\"").unwrap();
        assert_eq!(n, NotificationType::Favourite);
        assert_eq!(serde_json::to_string(&Visibility::Unlisted).unwrap(), "\"unlisted\"");
    }
}
