use crate::config::LlmProvider;
use crate::error::{Error, Result};
use crate::models::message::MessageRole;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

pub const SYSTEM_PROMPT: &str = "Ты — дружелюбный AI-ассистент в Telegram. \
Отвечай кратко и по делу, на языке пользователя. \
Если пользователь хочет обсудить сотрудничество, предложи оставить заявку через кнопку в /start.";

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Clone)]
pub struct AIService {
    client: Client,
    provider: LlmProvider,
    api_key: String,
    model: String,
}

impl AIService {
    pub fn new(provider: LlmProvider, api_key: String, model: String, client: Client) -> Self {
        Self {
            client,
            provider,
            api_key,
            model,
        }
    }

    /// Asks the configured model for the next assistant turn.
    pub async fn reply(&self, history: &[ChatTurn]) -> Result<String> {
        let text = match self.provider {
            LlmProvider::OpenAi => {
                let payload = openai_payload(&self.model, SYSTEM_PROMPT, history);
                let body = self
                    .post_json(self.client.post(OPENAI_URL).bearer_auth(&self.api_key), &payload)
                    .await?;
                extract_openai_text(&body)
            }
            LlmProvider::Gemini => {
                let url = format!("{}/{}:generateContent", GEMINI_BASE, self.model);
                let payload = gemini_payload(SYSTEM_PROMPT, history);
                let body = self
                    .post_json(
                        self.client.post(&url).query(&[("key", self.api_key.as_str())]),
                        &payload,
                    )
                    .await?;
                extract_gemini_text(&body)
            }
        };

        text.map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Llm("empty completion".to_string()))
    }

    async fn post_json(
        &self,
        request: reqwest::RequestBuilder,
        payload: &JsonValue,
    ) -> Result<JsonValue> {
        let res = request
            .json(payload)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| Error::Reqwest(e.without_url()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("{:?} API error {}: {}", self.provider, status, text)));
        }

        res.json().await.map_err(|e| Error::Reqwest(e.without_url()))
    }
}

pub fn openai_payload(model: &str, system_prompt: &str, history: &[ChatTurn]) -> JsonValue {
    let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
    messages.extend(history.iter().map(|turn| {
        json!({
            "role": turn.role.as_str(),
            "content": turn.text,
        })
    }));
    json!({
        "model": model,
        "messages": messages,
        "temperature": 0.7,
    })
}

pub fn gemini_payload(system_prompt: &str, history: &[ChatTurn]) -> JsonValue {
    let contents: Vec<JsonValue> = history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": turn.text }] })
        })
        .collect();
    json!({
        "system_instruction": { "parts": [{ "text": system_prompt }] },
        "contents": contents,
    })
}

pub fn extract_openai_text(body: &JsonValue) -> Option<String> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

pub fn extract_gemini_text(body: &JsonValue) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Some(text)
}
