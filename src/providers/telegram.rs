//! Telegram Bot API notifier
//!
//! Plain HTTPS transport: `sendMessage` for text, `sendPhoto`
//! (multipart) when a chart is attached. HTML parse mode throughout.
//! Bot-style `@username` targets receive only the bare CA payload the
//! downstream bot expects; numeric chat ids receive the full caption.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::providers::Notifier;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

pub struct BotApiNotifier {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl BotApiNotifier {
    pub fn new(token: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            token: token.into(),
            base_url: API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn check(&self, target: &str, resp: reqwest::Response) -> Result<()> {
        let status = resp.status();
        let body: ApiResponse = resp.json().await.map_err(|e| Error::Notify {
            target: target.to_string(),
            message: format!("bad response ({}): {}", status, e),
        })?;
        if !body.ok {
            return Err(Error::Notify {
                target: target.to_string(),
                message: body.description.unwrap_or_else(|| status.to_string()),
            });
        }
        debug!("Sent to {}", target);
        Ok(())
    }
}

/// Upload routing for one chart payload. `sendPhoto` only accepts
/// raster images; anything else (the built-in renderer emits SVG) goes
/// through `sendDocument`, which Telegram accepts for arbitrary files.
struct MediaKind {
    method: &'static str,
    field: &'static str,
    file_name: &'static str,
    mime: &'static str,
}

fn media_kind(bytes: &[u8]) -> MediaKind {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        MediaKind {
            method: "sendPhoto",
            field: "photo",
            file_name: "chart.png",
            mime: "image/png",
        }
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        MediaKind {
            method: "sendPhoto",
            field: "photo",
            file_name: "chart.jpg",
            mime: "image/jpeg",
        }
    } else {
        MediaKind {
            method: "sendDocument",
            field: "document",
            file_name: "chart.svg",
            mime: "image/svg+xml",
        }
    }
}

#[async_trait]
impl Notifier for BotApiNotifier {
    async fn send(&self, target: &str, text: &str, photo: Option<&[u8]>) -> Result<()> {
        match photo {
            Some(photo) => {
                let kind = media_kind(photo);
                let form = reqwest::multipart::Form::new()
                    .text("chat_id", target.to_string())
                    .text("caption", text.to_string())
                    .text("parse_mode", "HTML")
                    .part(
                        kind.field,
                        reqwest::multipart::Part::bytes(photo.to_vec())
                            .file_name(kind.file_name)
                            .mime_str(kind.mime)
                            .map_err(|e| Error::Notify {
                                target: target.to_string(),
                                message: e.to_string(),
                            })?,
                    );
                let resp = self
                    .client
                    .post(self.method_url(kind.method))
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| Error::Notify {
                        target: target.to_string(),
                        message: e.to_string(),
                    })?;
                self.check(target, resp).await
            }
            None => {
                let resp = self
                    .client
                    .post(self.method_url("sendMessage"))
                    .json(&serde_json::json!({
                        "chat_id": target,
                        "text": text,
                        "parse_mode": "HTML",
                        "disable_web_page_preview": true,
                    }))
                    .send()
                    .await
                    .map_err(|e| Error::Notify {
                        target: target.to_string(),
                        message: e.to_string(),
                    })?;
                self.check(target, resp).await
            }
        }
    }
}

/// Targets starting with '@' are downstream bots that want the bare CA
pub fn is_bot_target(target: &str) -> bool {
    target.starts_with('@')
}

/// One incoming group/channel message, reduced to what CA scanning needs
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub from_user: Option<i64>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

fn flatten_update(u: Update) -> Option<IncomingMessage> {
    let msg = u.message.or(u.channel_post)?;
    let text = msg.text.or(msg.caption)?;
    Some(IncomingMessage {
        chat_id: msg.chat.id,
        from_user: msg.from.map(|f| f.id),
        text,
    })
}

/// Long-polling `getUpdates` consumer for the Bot API
pub struct UpdatesPoller {
    client: reqwest::Client,
    token: String,
    base_url: String,
    offset: i64,
}

impl UpdatesPoller {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            base_url: API_BASE.to_string(),
            offset: 0,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One long poll. Empty vec on a quiet timeout.
    pub async fn poll(&mut self) -> Result<Vec<IncomingMessage>> {
        let url = format!("{}/bot{}/getUpdates", self.base_url, self.token);
        let resp: UpdatesResponse = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "offset": self.offset,
                "timeout": 30,
                "allowed_updates": ["message", "channel_post"],
            }))
            .timeout(Duration::from_secs(40))
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("getUpdates: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("getUpdates body: {}", e)))?;
        if !resp.ok {
            return Err(Error::Fetch("getUpdates returned ok=false".to_string()));
        }

        let mut out = Vec::new();
        for update in resp.result {
            self.offset = self.offset.max(update.update_id + 1);
            if let Some(msg) = flatten_update(update) {
                out.push(msg);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_bot_target() {
        assert!(is_bot_target("@somebot"));
        assert!(!is_bot_target("-1001234567890"));
        assert!(!is_bot_target("123456"));
    }

    #[test]
    fn test_method_url() {
        let n = BotApiNotifier::new("TOKEN", 10);
        assert_eq!(
            n.method_url("sendMessage"),
            "https://api.telegram.org/botTOKEN/sendMessage"
        );
    }

    #[test]
    fn test_media_kind_matches_payload_bytes() {
        let svg = media_kind(b"<svg xmlns='http://www.w3.org/2000/svg'>");
        assert_eq!(svg.method, "sendDocument");
        assert_eq!(svg.file_name, "chart.svg");
        assert_eq!(svg.mime, "image/svg+xml");

        let png = media_kind(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]);
        assert_eq!(png.method, "sendPhoto");
        assert_eq!(png.mime, "image/png");

        let jpg = media_kind(&[0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(jpg.method, "sendPhoto");
        assert_eq!(jpg.file_name, "chart.jpg");
    }

    #[test]
    fn test_flatten_update_prefers_message_text() {
        let u: Update = serde_json::from_str(
            r#"{"update_id":7,"message":{"chat":{"id":-100},"from":{"id":42},"text":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(
            flatten_update(u),
            Some(IncomingMessage {
                chat_id: -100,
                from_user: Some(42),
                text: "hi".to_string(),
            })
        );
    }

    #[test]
    fn test_flatten_update_channel_post_caption() {
        let u: Update = serde_json::from_str(
            r#"{"update_id":8,"channel_post":{"chat":{"id":-200},"caption":"CA here"}}"#,
        )
        .unwrap();
        let msg = flatten_update(u).unwrap();
        assert_eq!(msg.chat_id, -200);
        assert_eq!(msg.from_user, None);
        assert_eq!(msg.text, "CA here");
    }

    #[test]
    fn test_flatten_update_without_text_is_dropped() {
        let u: Update = serde_json::from_str(
            r#"{"update_id":9,"message":{"chat":{"id":-300}}}"#,
        )
        .unwrap();
        assert!(flatten_update(u).is_none());
    }
}
