use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Text sent back to a client that asked for a handshake.
pub const HANDSHAKE_REPLY_TEXT: &str = "Connection Successful...";
/// Sender name used on server-originated messages.
pub const SERVER_USER: &str = "server";

/// The `type` tag of a chat record. An open string; the relay only
/// distinguishes handshakes from everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageKind(String);

impl MessageKind {
    pub const CHAT: &'static str = "chat";
    pub const HANDSHAKE: &'static str = "handshake";
    /// Handshake tag sent by the bundled browser page.
    pub const LEGACY_HANDSHAKE: &'static str = "test";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn chat() -> Self {
        Self::new(Self::CHAT)
    }

    pub fn handshake() -> Self {
        Self::new(Self::HANDSHAKE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_handshake(&self) -> bool {
        self.0 == Self::HANDSHAKE || self.0 == Self::LEGACY_HANDSHAKE
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat record, as exchanged with browsers and carried over the broker.
///
/// The wire form is the same JSON object in both directions:
///
/// ```json
/// {"type":"chat","text":"hello","user":"alice","date":1000}
/// ```
///
/// Only a JSON object decodes. Unknown fields are ignored; missing and
/// `null` ones default to empty/zero. Nothing is validated: `user` and
/// `date` are whatever the sender claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Message {
    #[serde(rename = "type")]
    kind: MessageKind,
    text: String,
    user: String,
    date: i64,
}

/// Decoded field set of a wire record.
#[derive(Deserialize, Default)]
#[serde(default)]
struct Fields {
    #[serde(rename = "type")]
    kind: MessageKind,
    text: String,
    user: String,
    date: i64,
}

impl TryFrom<Map<String, Value>> for Message {
    type Error = serde_json::Error;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        fields.retain(|_, value| !value.is_null());
        let Fields {
            kind,
            text,
            user,
            date,
        } = serde_json::from_value(Value::Object(fields))?;
        Ok(Self {
            kind,
            text,
            user,
            date,
        })
    }
}

impl Message {
    pub fn new(
        kind: MessageKind,
        text: impl Into<String>,
        user: impl Into<String>,
        date: i64,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            user: user.into(),
            date,
        }
    }

    /// The server's answer to a handshake. Echoes the request's tag.
    pub fn handshake_reply(request: &Message) -> Self {
        Self::new(request.kind.clone(), HANDSHAKE_REPLY_TEXT, SERVER_USER, 0)
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn date(&self) -> i64 {
        self.date
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
