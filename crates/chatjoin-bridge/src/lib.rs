//! Chat bridge adapter (user-account side).
//!
//! Bots cannot join chats on their own, so joins go through an HTTP bridge that
//! drives a user account and answers in the Telegram Bot API envelope:
//! `{ "ok": bool, "result": ..., "error_code": n, "description": "...",
//! "parameters": { "retry_after": n } }`.
//!
//! Methods:
//! - `POST {base}/getMemberships` -> `[{ "id": n, "type": "channel", "username": "..." }]`
//! - `POST {base}/joinChat` with `{ "chat_id": "@name" }` -> `true`

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::debug;

use chatjoin_core::{
    domain::ChatHandle,
    errors::Error,
    platform::{ChatKind, ChatMembership, ChatPlatform, JoinOutcome},
    Result,
};

/// Wait used when the bridge signals 429 without saying for how long.
const DEFAULT_FLOOD_WAIT: Duration = Duration::from_secs(30);

const ALREADY_MEMBER_CODES: &[&str] = &["USER_ALREADY_PARTICIPANT"];
const UNJOINABLE_CODES: &[&str] = &[
    "INVITE_HASH_INVALID",
    "INVITE_HASH_EXPIRED",
    "CHANNEL_PRIVATE",
    "CHANNEL_INVALID",
    "USERNAME_INVALID",
    "USERNAME_NOT_OCCUPIED",
    "CHAT NOT FOUND",
];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BridgeChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    username: Option<String>,
}

impl From<BridgeChat> for ChatMembership {
    fn from(c: BridgeChat) -> Self {
        let kind = match c.kind.as_str() {
            "channel" => ChatKind::Channel,
            "group" | "supergroup" => ChatKind::Group,
            _ => ChatKind::Private,
        };
        ChatMembership {
            id: c.id,
            handle: c.username,
            kind,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BridgeClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("bridge client build error: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<(u16, Envelope<T>)> {
        let mut req = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::External(format!("bridge request error: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("bridge read error: {e}")))?;
        debug!(method, status = status.as_u16(), "bridge response");

        let envelope = serde_json::from_str::<Envelope<T>>(&text).map_err(|_| {
            Error::External(format!(
                "bridge {method} failed: {status} {}",
                text.chars().take(200).collect::<String>()
            ))
        })?;
        Ok((status.as_u16(), envelope))
    }
}

#[async_trait]
impl ChatPlatform for BridgeClient {
    async fn list_memberships(&self) -> Result<Vec<ChatMembership>> {
        let (status, envelope) = self
            .call::<Vec<BridgeChat>>("getMemberships", json!({}))
            .await?;
        if !envelope.ok {
            return Err(Error::External(format!(
                "bridge getMemberships failed: {status} {}",
                envelope.description.unwrap_or_default()
            )));
        }
        Ok(envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .map(ChatMembership::from)
            .collect())
    }

    async fn join(&self, handle: &ChatHandle) -> JoinOutcome {
        match self
            .call::<serde_json::Value>("joinChat", json!({ "chat_id": handle.as_str() }))
            .await
        {
            Ok((status, envelope)) => classify_join(status, &envelope),
            Err(e) => JoinOutcome::Failed {
                description: e.to_string(),
            },
        }
    }
}

fn classify_join<T>(http_status: u16, envelope: &Envelope<T>) -> JoinOutcome {
    if envelope.ok {
        return JoinOutcome::Joined;
    }

    let description = envelope.description.clone().unwrap_or_default();
    if let Some(secs) = envelope.parameters.as_ref().and_then(|p| p.retry_after) {
        return JoinOutcome::RateLimited {
            wait: Duration::from_secs(secs),
        };
    }
    if let Some(secs) = flood_wait_secs(&description) {
        return JoinOutcome::RateLimited {
            wait: Duration::from_secs(secs),
        };
    }
    if http_status == 429 || envelope.error_code == Some(429) {
        return JoinOutcome::RateLimited {
            wait: DEFAULT_FLOOD_WAIT,
        };
    }

    let upper = description.to_uppercase();
    if ALREADY_MEMBER_CODES.iter().any(|c| upper.contains(c)) {
        return JoinOutcome::AlreadyMember;
    }
    if UNJOINABLE_CODES.iter().any(|c| upper.contains(c)) {
        return JoinOutcome::Unjoinable;
    }

    let description = if description.is_empty() {
        format!(
            "bridge error {}",
            envelope.error_code.unwrap_or(i64::from(http_status))
        )
    } else {
        description
    };
    JoinOutcome::Failed { description }
}

/// Seconds from an MTProto style `FLOOD_WAIT_<n>` marker.
fn flood_wait_secs(description: &str) -> Option<u64> {
    let (_, rest) = description.split_once("FLOOD_WAIT_")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(raw: &str) -> Envelope<serde_json::Value> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn ok_envelope_is_joined() {
        assert_eq!(
            classify_join(200, &envelope(r#"{"ok":true,"result":true}"#)),
            JoinOutcome::Joined
        );
    }

    #[test]
    fn retry_after_and_flood_wait_are_rate_limits() {
        assert_eq!(
            classify_join(
                429,
                &envelope(
                    r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 17","parameters":{"retry_after":17}}"#
                )
            ),
            JoinOutcome::RateLimited {
                wait: Duration::from_secs(17)
            }
        );
        assert_eq!(
            classify_join(
                400,
                &envelope(r#"{"ok":false,"error_code":420,"description":"FLOOD_WAIT_300"}"#)
            ),
            JoinOutcome::RateLimited {
                wait: Duration::from_secs(300)
            }
        );
        assert_eq!(
            classify_join(429, &envelope(r#"{"ok":false}"#)),
            JoinOutcome::RateLimited {
                wait: DEFAULT_FLOOD_WAIT
            }
        );
    }

    #[test]
    fn known_descriptions_map_to_outcomes() {
        assert_eq!(
            classify_join(
                400,
                &envelope(r#"{"ok":false,"error_code":400,"description":"Bad Request: USER_ALREADY_PARTICIPANT"}"#)
            ),
            JoinOutcome::AlreadyMember
        );
        for desc in [
            "Bad Request: CHANNEL_PRIVATE",
            "Bad Request: INVITE_HASH_INVALID",
            "Bad Request: chat not found",
            "USERNAME_NOT_OCCUPIED",
        ] {
            let raw = json!({ "ok": false, "error_code": 400, "description": desc }).to_string();
            assert_eq!(classify_join(400, &envelope(&raw)), JoinOutcome::Unjoinable, "{desc}");
        }
    }

    #[test]
    fn unknown_errors_keep_description() {
        assert_eq!(
            classify_join(
                400,
                &envelope(r#"{"ok":false,"error_code":400,"description":"CHANNELS_TOO_MUCH"}"#)
            ),
            JoinOutcome::Failed {
                description: "CHANNELS_TOO_MUCH".to_string()
            }
        );
        assert_eq!(
            classify_join(500, &envelope(r#"{"ok":false}"#)),
            JoinOutcome::Failed {
                description: "bridge error 500".to_string()
            }
        );
    }

    #[test]
    fn bridge_chats_map_to_memberships() {
        let env: Envelope<Vec<BridgeChat>> = serde_json::from_str(
            r#"{"ok":true,"result":[
                {"id":-1001,"type":"channel","username":"news_chan"},
                {"id":-1002,"type":"supergroup"},
                {"id":42,"type":"private","username":"friend"}
            ]}"#,
        )
        .unwrap();
        let chats: Vec<ChatMembership> = env
            .result
            .unwrap()
            .into_iter()
            .map(ChatMembership::from)
            .collect();

        assert_eq!(chats[0].kind, ChatKind::Channel);
        assert_eq!(chats[0].handle.as_deref(), Some("news_chan"));
        assert_eq!(chats[1].kind, ChatKind::Group);
        assert_eq!(chats[1].handle, None);
        assert_eq!(chats[2].kind, ChatKind::Private);
    }

    #[test]
    fn flood_wait_marker_parsing() {
        assert_eq!(flood_wait_secs("A wait of FLOOD_WAIT_42 required"), Some(42));
        assert_eq!(flood_wait_secs("FLOOD_WAIT_"), None);
        assert_eq!(flood_wait_secs("nothing"), None);
    }

    #[test]
    fn client_trims_trailing_slash() {
        let c = BridgeClient::new("http://127.0.0.1:8081/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(c.base_url, "http://127.0.0.1:8081");
    }
}
