//! Wire schema for the chat server.
//!
//! Every record is a flat JSON object carrying an `action` discriminator.
//! Outbound records are built from [`OutboundIntent`], inbound records are
//! parsed into [`InboundEvent`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ChatError;

/// Records sent from the client to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action")]
pub enum OutboundIntent {
    #[serde(rename = "username")]
    SetUsername { username: String },
    #[serde(rename = "broadcast")]
    SendBroadcast { username: String, message: String },
    /// `to` is always the resolved peer name.
    #[serde(rename = "private")]
    SendPrivate {
        username: String,
        to: String,
        message: String,
    },
    #[serde(rename = "typing")]
    Typing { username: String },
    #[serde(rename = "left")]
    Leave,
}

impl OutboundIntent {
    pub fn action(&self) -> &'static str {
        match self {
            OutboundIntent::SetUsername { .. } => "username",
            OutboundIntent::SendBroadcast { .. } => "broadcast",
            OutboundIntent::SendPrivate { .. } => "private",
            OutboundIntent::Typing { .. } => "typing",
            OutboundIntent::Leave => "left",
        }
    }

    pub fn encode(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(|e| ChatError::Encode(e.to_string()))
    }
}

/// Records received from the server.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InboundEvent {
    ListUsers {
        #[serde(default, deserialize_with = "null_as_empty")]
        connected_users: Vec<String>,
    },
    Typing {
        from: String,
    },
    Broadcast {
        #[serde(default)]
        username: String,
        message: String,
        #[serde(default, deserialize_with = "blank_as_none")]
        timestamp: Option<String>,
    },
    Private {
        from: String,
        to: String,
        message: String,
        #[serde(default, deserialize_with = "blank_as_none")]
        timestamp: Option<String>,
    },
    Error {
        message: String,
    },
}

const INBOUND_ACTIONS: &[&str] = &["list_users", "typing", "broadcast", "private", "error"];

impl InboundEvent {
    pub fn action(&self) -> &'static str {
        match self {
            InboundEvent::ListUsers { .. } => "list_users",
            InboundEvent::Typing { .. } => "typing",
            InboundEvent::Broadcast { .. } => "broadcast",
            InboundEvent::Private { .. } => "private",
            InboundEvent::Error { .. } => "error",
        }
    }

    /// Parses one inbound record.
    ///
    /// Returns `Ok(None)` for records whose `action` this client does not
    /// know, so newer servers can add actions without breaking older clients.
    pub fn decode(raw: &str) -> Result<Option<InboundEvent>, ChatError> {
        let value: Value = serde_json::from_str(raw)?;
        let known = match &value {
            Value::Object(record) => match record.get("action") {
                Some(Value::String(action)) => INBOUND_ACTIONS.contains(&action.as_str()),
                Some(_) => {
                    return Err(ChatError::MalformedMessage(
                        "`action` is not a string".to_string(),
                    ))
                }
                None => return Err(ChatError::MalformedMessage("missing `action`".to_string())),
            },
            _ => {
                return Err(ChatError::MalformedMessage(
                    "record is not an object".to_string(),
                ))
            }
        };

        if !known {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

// The server serialises an empty user list as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}
