//! Domain entities returned by the API.
//!
//! Every entity implements [`Entity`], so the decoder can attach the JSON
//! text it came from. Nested entities (e.g. the account of a status) are
//! decoded as part of their parent and carry no text of their own.
//!
//! Decoding is lenient about missing members, as servers omit many of them
//! depending on version and context. Ids are accepted both as JSON numbers
//! and as digit strings.

use crate::decode::Entity;
use crate::types::{AttachmentType, NotificationType, Scope, SerializeOptions, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! impl_entity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Entity for $ty {
                fn raw_json(&self) -> Option<&str> {
                    self.raw_json.as_deref()
                }

                fn set_raw_json(&mut self, raw: String) {
                    self.raw_json = Some(raw);
                }
            }
        )*
    };
}

/// A user account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    pub username: String,
    /// `username` for local accounts, `username@domain` for remote ones.
    pub acct: String,
    pub display_name: String,
    pub locked: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub followers_count: u64,
    pub following_count: u64,
    pub statuses_count: u64,
    /// Biography, as HTML.
    pub note: String,
    pub url: String,
    pub avatar: String,
    pub avatar_static: String,
    pub header: String,
    pub header_static: String,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// A status (post).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    pub uri: String,
    pub url: Option<String>,
    pub account: Account,
    #[serde(deserialize_with = "de_opt_id")]
    pub in_reply_to_id: Option<u64>,
    #[serde(deserialize_with = "de_opt_id")]
    pub in_reply_to_account_id: Option<u64>,
    pub reblog: Option<Box<Status>>,
    /// Body, as HTML.
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub reblogs_count: u64,
    pub favourites_count: u64,
    pub reblogged: Option<bool>,
    pub favourited: Option<bool>,
    pub sensitive: Option<bool>,
    pub spoiler_text: String,
    pub visibility: Visibility,
    pub media_attachments: Vec<Attachment>,
    pub mentions: Vec<Mention>,
    pub tags: Vec<Tag>,
    pub application: Option<Application>,
    #[serde(default = "default_language")]
    pub language: Option<String>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

fn default_language() -> Option<String> {
    Some("en".to_string())
}

/// A notification for the authenticated user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub account: Account,
    /// The status concerned; absent for follows.
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// A media attachment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: AttachmentType,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub text_url: Option<String>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// A mentioned account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mention {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    pub url: String,
    pub username: String,
    pub acct: String,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// A hashtag used in a status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub name: String,
    pub url: String,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// The application a status was posted from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Application {
    pub name: String,
    pub website: Option<String>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// Relationship between the authenticated user and another account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relationship {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    pub following: bool,
    pub followed_by: bool,
    pub blocking: bool,
    pub muting: bool,
    pub requested: bool,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// Information about the server.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub uri: String,
    pub title: String,
    pub description: String,
    pub email: String,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// Preview card of a link in a status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Card {
    pub url: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// Thread around a status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    pub ancestors: Vec<Status>,
    pub descendants: Vec<Status>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// Search results.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Results {
    pub accounts: Vec<Account>,
    pub statuses: Vec<Status>,
    pub hashtags: Vec<String>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// A report filed by the authenticated user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    pub action_taken: Option<String>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// OAuth token grant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(with = "chrono::serde::ts_seconds_option", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

/// An application registered with a server.
///
/// `host` and `scope` are not part of the API response; they are filled in
/// locally after registration and only written out when asked to, see
/// [`RegisteredApp::to_json`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisteredApp {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing)]
    pub host: Option<String>,
    #[serde(skip_serializing)]
    pub scope: Option<Scope>,
    #[serde(skip)]
    pub raw_json: Option<String>,
}

impl RegisteredApp {
    /// Serialize to JSON.
    ///
    /// With [`SerializeOptions::include_host_and_scope`] the locally known
    /// `host` and `scope` are written too, so the app can be restored later
    /// with [`decode`](crate::decode::decode).
    pub fn to_json(&self, options: SerializeOptions) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;

        if options.include_host_and_scope {
            if let serde_json::Value::Object(map) = &mut value {
                map.insert("host".to_string(), serde_json::to_value(&self.host)?);
                map.insert("scope".to_string(), serde_json::to_value(self.scope)?);
            }
        }

        serde_json::to_string(&value)
    }
}

/// Body of endpoints that answer with `{}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {
    #[serde(skip)]
    pub raw_json: Option<String>,
}

impl_entity!(
    Account,
    Status,
    Notification,
    Attachment,
    Mention,
    Tag,
    Application,
    Relationship,
    Instance,
    Card,
    Context,
    Results,
    Report,
    TokenInfo,
    RegisteredApp,
    Empty,
);

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(u64),
    Text(String),
}

impl WireId {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            WireId::Number(n) => Ok(n),
            WireId::Text(s) => s
                .parse()
                .map_err(|_| E::custom(format!("invalid id: {:?}", s))),
        }
    }
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    WireId::deserialize(deserializer)?.into_u64()
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<WireId>::deserialize(deserializer)?
        .map(WireId::into_u64)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;

    #[test]
    fn test_status_from_minimal_payload() {
        let status: Status = decode(r#"{"id":1,"content":"hi"}"#).unwrap();
        assert_eq!(status.id, 1);
        assert_eq!(status.content, "hi");
        assert_eq!(status.language.as_deref(), Some("en"));
        assert_eq!(status.visibility, Visibility::Public);
        assert!(status.reblog.is_none());
    }

    #[test]
    fn test_status_full_payload() {
        let text = r#"{
            "id": "103270115826048975",
            "uri": "https://mastodon.social/users/Gargron/statuses/103270115826048975",
            "url": "https://mastodon.social/@Gargron/103270115826048975",
            "account": {"id": "1", "username": "Gargron", "acct": "Gargron", "locked": false},
            "in_reply_to_id": null,
            "in_reply_to_account_id": "2",
            "reblog": null,
            "content": "<p>Hello</p>",
            "created_at": "2019-12-08T03:48:33.901Z",
            "reblogs_count": 6,
            "favourites_count": 11,
            "sensitive": false,
            "spoiler_text": "",
            "visibility": "unlisted",
            "media_attachments": [{"id": 22, "type": "image", "url": "https://files/1.png", "remote_url": null}],
            "mentions": [{"id": 3, "username": "a", "acct": "a@b", "url": "https://b/@a"}],
            "tags": [{"name": "rust", "url": "https://h/tags/rust"}],
            "application": {"name": "Web", "website": null},
            "language": "de"
        }"#;

        let status: Status = decode(text).unwrap();
        assert_eq!(status.id, 103270115826048975);
        assert_eq!(status.account.username, "Gargron");
        assert_eq!(status.in_reply_to_id, None);
        assert_eq!(status.in_reply_to_account_id, Some(2));
        assert_eq!(status.visibility, Visibility::Unlisted);
        assert_eq!(status.media_attachments[0].kind, AttachmentType::Image);
        assert_eq!(status.mentions[0].acct, "a@b");
        assert_eq!(status.tags[0].name, "rust");
        assert_eq!(status.language.as_deref(), Some("de"));
        assert!(status.created_at.is_some());
        assert_eq!(status.raw_json(), Some(text));
        assert_eq!(status.account.raw_json(), None);
    }

    #[test]
    fn test_notification_requires_type() {
        let n: Notification =
            decode(r#"{"id": 5, "type": "follow", "account": {"id": 9}}"#).unwrap();
        assert_eq!(n.kind, NotificationType::Follow);
        assert_eq!(n.account.id, 9);
        assert!(n.status.is_none());

        assert!(decode::<Notification>(r#"{"id": 5}"#).is_err());
    }

    #[test]
    fn test_bad_string_id() {
        assert!(decode::<Account>(r#"{"id": "abc"}"#).is_err());
    }

    #[test]
    fn test_token_info_unix_time() {
        let token: TokenInfo = decode(
            r#"{"access_token":"tok","token_type":"bearer","scope":"read write","created_at":1492112156}"#,
        )
        .unwrap();
        assert_eq!(token.scope.to_string(), "read write");
        assert_eq!(token.created_at.unwrap().timestamp(), 1492112156);
    }

    fn registered() -> RegisteredApp {
        RegisteredApp {
            id: 12,
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            host: Some("mastodon.cloud".to_string()),
            scope: Some(Scope::ALL),
            raw_json: None,
        }
    }

    #[test]
    fn test_registered_app_hides_local_fields_by_default() {
        let json = registered().to_json(SerializeOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("host").is_none());
        assert!(value.get("scope").is_none());
        assert_eq!(value["client_id"], "cid");
    }

    #[test]
    fn test_registered_app_persisted_round_trip() {
        let app = registered();
        let json = app.to_json(SerializeOptions::persisted()).unwrap();

        let restored: RegisteredApp = decode(&json).unwrap();
        assert_eq!(restored.host.as_deref(), Some("mastodon.cloud"));
        assert_eq!(restored.scope, Some(Scope::ALL));
        assert_eq!(restored.client_secret, "secret");
    }
}
