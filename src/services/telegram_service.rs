use crate::dto::telegram_dto::{ApiResponse, InlineKeyboardMarkup, TelegramUpdate, WebhookInfo};
use crate::error::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::{info, warn};

/// Telegram measures message length in UTF-16 code units and rejects
/// anything longer than this.
pub const MAX_MESSAGE_UTF16_UNITS: usize = 4096;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramService {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl std::fmt::Debug for TelegramService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramService")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramService {
    pub fn new(bot_token: String, client: Client) -> Self {
        Self {
            client,
            api_base: API_BASE.to_string(),
            bot_token,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &JsonValue,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);
        let mut request = self.client.post(&url).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        // The request URL embeds the token, so it is stripped from transport errors.
        let response = request.send().await.map_err(|e| Error::Reqwest(e.without_url()))?;
        let status = response.status();
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Reqwest(e.without_url()))?;

        if !parsed.ok {
            return Err(Error::Telegram(format!(
                "{} failed ({}): {}",
                method,
                status,
                parsed.description.unwrap_or_default()
            )));
        }
        parsed
            .result
            .ok_or_else(|| Error::Telegram(format!("{} returned no result", method)))
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = serde_json::to_value(markup)?;
        }

        tracing::debug!(chat_id, chars = text.chars().count(), "sending Telegram message");
        let _: JsonValue = self.call("sendMessage", &body, None).await?;
        Ok(())
    }

    /// Sends `text` as consecutive messages that each fit Telegram's limit.
    pub async fn send_long_message(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_UTF16_UNITS) {
            self.send_message(chat_id, &chunk, None).await?;
        }
        Ok(())
    }

    pub async fn send_typing(&self, chat_id: i64) -> Result<()> {
        let body = json!({ "chat_id": chat_id, "action": "typing" });
        let _: bool = self.call("sendChatAction", &body, None).await?;
        Ok(())
    }

    pub async fn get_webhook_info(&self) -> Result<WebhookInfo> {
        self.call("getWebhookInfo", &json!({}), None).await
    }

    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message"],
        });
        if let Some(secret) = secret_token {
            body["secret_token"] = json!(secret);
        }
        let _: bool = self.call("setWebhook", &body, None).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self
            .call("deleteWebhook", &json!({ "drop_pending_updates": false }), None)
            .await?;
        Ok(())
    }

    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<TelegramUpdate>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        // Long polling keeps the request open for `timeout_secs`.
        self.call(
            "getUpdates",
            &body,
            Some(Duration::from_secs(timeout_secs + 10)),
        )
        .await
    }

    /// Registers `target_url` unless Telegram already points there.
    pub async fn ensure_webhook(&self, target_url: &str, secret_token: Option<&str>) -> Result<()> {
        let current = self.get_webhook_info().await?;
        if current.url == target_url && secret_token.is_none() {
            info!("Telegram webhook is already up to date");
            return Ok(());
        }
        if let Some(err) = &current.last_error_message {
            warn!("Telegram reported webhook error: {}", err);
        }
        info!("Registering Telegram webhook");
        self.set_webhook(target_url, secret_token).await
    }
}

/// Splits `text` into pieces of at most `max_units` UTF-16 code units,
/// preferring to break after a newline when one falls inside the window.
/// Characters are never split, so a surrogate pair stays in one piece.
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(2);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.encode_utf16().count() > max_units {
        let mut units = 0;
        let mut window_end = rest.len();
        for (i, c) in rest.char_indices() {
            units += c.len_utf16();
            if units > max_units {
                window_end = i;
                break;
            }
        }
        let window = &rest[..window_end];
        let cut = match window.rfind('\n') {
            Some(i) if i > 0 => i + 1,
            _ => window_end,
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
        assert_eq!(split_message("", 4096), vec![""]);
    }

    #[test]
    fn long_text_respects_char_limit_on_multibyte_input() {
        let text = "я".repeat(10);
        let chunks = split_message(&text, 4);
        assert_eq!(chunks, vec!["яяяя", "яяяя", "яя"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn astral_characters_count_as_two_units() {
        let chunks = split_message(&"😀".repeat(5), 4);
        assert_eq!(chunks, vec!["😀😀", "😀😀", "😀"]);
    }

    #[test]
    fn emoji_heavy_reply_fits_telegram_limit() {
        let text = "😀".repeat(MAX_MESSAGE_UTF16_UNITS);
        let chunks = split_message(&text, MAX_MESSAGE_UTF16_UNITS);
        assert_eq!(chunks.len(), 2);
        assert!(chunks
            .iter()
            .all(|c| c.encode_utf16().count() <= MAX_MESSAGE_UTF16_UNITS));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn breaks_after_newline_when_possible() {
        let chunks = split_message("ab\ncdef", 4);
        assert_eq!(chunks, vec!["ab\n", "cdef"]);
    }

    #[test]
    fn debug_does_not_print_token() {
        let svc = TelegramService::new("123:SECRET".into(), Client::new());
        assert!(!format!("{:?}", svc).contains("SECRET"));
    }
}
