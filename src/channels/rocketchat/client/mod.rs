//! Stateless request layer over the Rocket.Chat REST API (v1).
//!
//! Every call authenticates with the `X-Auth-Token` / `X-User-Id` header pair.
//! Non-2xx responses become [`RemoteApiError`]; nothing here retries or logs
//! beyond debug tracing, callers decide how fatal a failure is.

use crate::config::ResolvedAccount;
use crate::utils::http::{
    MAX_ATTACHMENT_BYTES, MAX_ERROR_BODY_BYTES, default_http_client, limited_body, limited_text,
};
use crate::utils::truncate_chars;
use reqwest::{Client, RequestBuilder, Response};
use rocketlink_core::{ChatMessage, FileRef, ThreadReplies};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Longest error body kept on a [`RemoteApiError`].
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method} {path} failed with HTTP {status}: {body}")]
pub struct RemoteApiError {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    RemoteApi(#[from] RemoteApiError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{path} rejected the request: {message}")]
    Rejected { path: String, message: String },

    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status of a remote rejection, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteApi(e) => Some(e.status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoom {
    pub room_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadQuery {
    pub count: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage<'a> {
    pub room_id: &'a str,
    pub text: &'a str,
    pub thread_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub message_id: String,
}

/// Result of `me`. Never an error: any failure collapses to `ok: false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityProbe {
    pub ok: bool,
    pub username: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
struct IdOnly {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct ChannelInfoResponse {
    channel: IdOnly,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct MessageResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct PostResponse {
    message: IdOnly,
}

#[derive(Deserialize)]
struct MeResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Clone)]
pub struct RocketChatClient {
    base_url: String,
    auth_token: String,
    user_id: String,
    http: Client,
}

impl std::fmt::Debug for RocketChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocketChatClient")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl RocketChatClient {
    pub fn new(server_url: &str, auth_token: &str, user_id: &str) -> Self {
        Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
            user_id: user_id.to_string(),
            http: default_http_client(),
        }
    }

    pub fn from_account(account: &ResolvedAccount) -> Self {
        Self::new(&account.server_url, &account.auth_token, &account.user_id)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-Auth-Token", &self.auth_token)
            .header("X-User-Id", &self.user_id)
    }

    async fn ensure_success(method: &str, path: &str, resp: Response) -> ClientResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = limited_text(resp, MAX_ERROR_BODY_BYTES)
            .await
            .unwrap_or_default();
        Err(RemoteApiError {
            method: method.to_string(),
            path: path.to_string(),
            status: status.as_u16(),
            body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
        }
        .into())
    }

    fn decode<T: DeserializeOwned>(path: &str, value: Value) -> ClientResult<T> {
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ClientError::Rejected {
                path: path.to_string(),
                message,
            });
        }
        serde_json::from_value(value).map_err(|e| ClientError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        debug!("rocketchat GET {}", path);
        let resp = self
            .authed(self.http.get(self.api_url(path)))
            .query(query)
            .send()
            .await?;
        let resp = Self::ensure_success("GET", path, resp).await?;
        let value: Value = resp.json().await?;
        Self::decode(path, value)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> ClientResult<T> {
        debug!("rocketchat POST {}", path);
        let resp = self
            .authed(self.http.post(self.api_url(path)))
            .json(body)
            .send()
            .await?;
        let resp = Self::ensure_success("POST", path, resp).await?;
        let value: Value = resp.json().await?;
        Self::decode(path, value)
    }

    pub async fn resolve_channel(&self, name: &str) -> ClientResult<ResolvedRoom> {
        let name = name.trim_start_matches('#');
        let info: ChannelInfoResponse = self
            .get_json("channels.info", &[("roomName", name.to_string())])
            .await?;
        Ok(ResolvedRoom {
            room_id: info.channel.id,
        })
    }

    /// Most recent `count` messages of a channel, newest first.
    pub async fn fetch_channel_history(
        &self,
        room_id: &str,
        count: u32,
    ) -> ClientResult<Vec<ChatMessage>> {
        let history: HistoryResponse = self
            .get_json(
                "channels.history",
                &[("roomId", room_id.to_string()), ("count", count.to_string())],
            )
            .await?;
        Ok(history.messages)
    }

    /// Replies of a thread in chronological order, paginated by `offset`.
    pub async fn fetch_thread_replies(
        &self,
        thread_id: &str,
        query: ThreadQuery,
    ) -> ClientResult<ThreadReplies> {
        self.get_json(
            "chat.getThreadMessages",
            &[
                ("tmid", thread_id.to_string()),
                ("count", query.count.to_string()),
                ("offset", query.offset.to_string()),
            ],
        )
        .await
    }

    pub async fn fetch_message(&self, message_id: &str) -> ClientResult<ChatMessage> {
        let resp: MessageResponse = self
            .get_json("chat.getMessage", &[("msgId", message_id.to_string())])
            .await?;
        Ok(resp.message)
    }

    pub async fn post_message(&self, msg: PostMessage<'_>) -> ClientResult<PostedMessage> {
        let mut body = json!({
            "roomId": msg.room_id,
            "text": msg.text,
        });
        if let Some(tmid) = msg.thread_id {
            body["tmid"] = Value::String(tmid.to_string());
        }
        let resp: PostResponse = self.post_json("chat.postMessage", &body).await?;
        Ok(PostedMessage {
            message_id: resp.message.id,
        })
    }

    /// Toggle `emoji` on a message for the authenticated user.
    ///
    /// The server treats this as a toggle: `should_react = false` on an emoji the
    /// user has not applied adds it. Only call with `false` when the reaction is
    /// known to be present.
    pub async fn set_reaction(
        &self,
        message_id: &str,
        emoji: &str,
        should_react: bool,
    ) -> ClientResult<()> {
        let body = json!({
            "messageId": message_id,
            "emoji": emoji,
            "shouldReact": should_react,
        });
        let _: Value = self.post_json("chat.react", &body).await?;
        Ok(())
    }

    /// Absolute download URL of an uploaded file.
    pub fn attachment_url(&self, file: &FileRef) -> String {
        format!(
            "{}/file-upload/{}/{}",
            self.base_url,
            file.id,
            urlencoding::encode(&file.name)
        )
    }

    /// Download `url` (absolute, or relative to the server) into `dest`.
    pub async fn download_attachment(&self, url: &str, dest: &Path) -> ClientResult<()> {
        let url = if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            url.to_string()
        };
        let resp = self.authed(self.http.get(&url)).send().await?;
        let resp = Self::ensure_success("GET", &url, resp).await?;
        let body = limited_body(resp, MAX_ATTACHMENT_BYTES)
            .await
            .map_err(|e| ClientError::Decode {
                path: url.clone(),
                message: e.to_string(),
            })?;
        if body.truncated {
            return Err(ClientError::Decode {
                path: url,
                message: format!("attachment exceeds {} bytes", MAX_ATTACHMENT_BYTES),
            });
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &body.bytes).await?;
        debug!("downloaded {} bytes to {}", body.bytes.len(), dest.display());
        Ok(())
    }

    pub async fn probe_identity(&self) -> IdentityProbe {
        match self.get_json::<MeResponse>("me", &[]).await {
            Ok(me) => IdentityProbe {
                ok: true,
                username: me.username,
                user_id: Some(me.id),
            },
            Err(e) => {
                debug!("rocketchat identity probe failed: {}", e);
                IdentityProbe::default()
            }
        }
    }
}

#[cfg(test)]
mod tests;
