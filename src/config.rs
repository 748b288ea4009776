use crate::error::{Error, Result};
use chrono::Duration;
use dotenvy::dotenv;
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown provider '{}', expected openai or gemini", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Webhook,
    Polling,
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(Self::Webhook),
            "polling" => Ok(Self::Polling),
            other => Err(format!("unknown mode '{}', expected webhook or polling", other)),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub telegram_bot_token: String,
    pub llm_provider: LlmProvider,
    pub llm_api_key: String,
    pub llm_model: String,
    pub public_url: Option<String>,
    pub delivery_mode: DeliveryMode,
    pub webhook_path: String,
    pub webhook_secret: Option<String>,
    pub webapp_url: Option<String>,
    pub owner_chat_id: Option<i64>,
    pub daily_message_limit: i32,
    pub history_limit: i64,
    pub init_data_max_age: Option<Duration>,
    pub cors_allowed_origins: Vec<String>,
}

// Tokens and keys stay out of log output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_address", &self.server_address)
            .field("llm_provider", &self.llm_provider)
            .field("llm_model", &self.llm_model)
            .field("public_url", &self.public_url)
            .field("delivery_mode", &self.delivery_mode)
            .field("webapp_url", &self.webapp_url)
            .field("owner_chat_id", &self.owner_chat_id)
            .field("daily_message_limit", &self.daily_message_limit)
            .field("history_limit", &self.history_limit)
            .field("init_data_max_age", &self.init_data_max_age)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish_non_exhaustive()
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let telegram_bot_token = get_env_any(&["TELEGRAM_BOT_TOKEN", "TELEGRAM_TOKEN"])?;

        let server_address = match get_env_opt("SERVER_ADDRESS") {
            Some(addr) => addr,
            None => {
                let port: u16 = get_env_parse_or("PORT", 10000)?;
                format!("0.0.0.0:{}", port)
            }
        };

        let llm_provider: LlmProvider = get_env_parse_or("LLM_PROVIDER", LlmProvider::OpenAi)?;
        let (llm_api_key, llm_model) = match llm_provider {
            LlmProvider::OpenAi => (
                get_env("OPENAI_API_KEY")?,
                get_env_opt("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ),
            LlmProvider::Gemini => (
                get_env("GEMINI_API_KEY")?,
                get_env_opt("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            ),
        };

        let public_url = get_env_opt("PUBLIC_URL")
            .or_else(|| get_env_opt("RENDER_EXTERNAL_URL"))
            .map(|url| url.trim_end_matches('/').to_string());

        let default_mode = if public_url.is_some() {
            DeliveryMode::Webhook
        } else {
            DeliveryMode::Polling
        };
        let delivery_mode: DeliveryMode = get_env_parse_or("BOT_DELIVERY_MODE", default_mode)?;
        if delivery_mode == DeliveryMode::Webhook && public_url.is_none() {
            return Err(Error::Config(
                "Webhook delivery requires PUBLIC_URL or RENDER_EXTERNAL_URL".to_string(),
            ));
        }

        let webhook_path = get_env_opt("TELEGRAM_WEBHOOK_PATH")
            .unwrap_or_else(|| default_webhook_path(&telegram_bot_token));

        let owner_chat_id = match get_env_opt("OWNER_CHAT_ID") {
            Some(_) => Some(get_env_parse("OWNER_CHAT_ID")?),
            None => None,
        };
        let init_data_max_age = match get_env_opt("INIT_DATA_MAX_AGE_SECS") {
            Some(raw) => Some(parse_max_age("INIT_DATA_MAX_AGE_SECS", &raw)?),
            None => None,
        };

        Ok(Self {
            server_address,
            database_url: get_env("DATABASE_URL")?,
            telegram_bot_token,
            llm_provider,
            llm_api_key,
            llm_model,
            public_url,
            delivery_mode,
            webhook_path,
            webhook_secret: get_env_opt("TELEGRAM_WEBHOOK_SECRET"),
            webapp_url: get_env_opt("WEBAPP_URL"),
            owner_chat_id,
            daily_message_limit: get_env_parse_or("DAILY_MESSAGE_LIMIT", 30)?,
            history_limit: get_env_parse_or("HISTORY_LIMIT", 10)?,
            init_data_max_age,
            cors_allowed_origins: parse_origins(
                &get_env_opt("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string()),
            ),
        })
    }

    pub fn webhook_url(&self) -> Option<String> {
        self.public_url
            .as_ref()
            .map(|base| format!("{}/webhook/{}", base, self.webhook_path))
    }
}

fn get_env(name: &str) -> Result<String> {
    get_env_opt(name)
        .ok_or_else(|| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_any(names: &[&str]) -> Result<String> {
    names
        .iter()
        .find_map(|name| get_env_opt(name))
        .ok_or_else(|| {
            Error::Config(format!("Missing environment variable: {}", names.join(" or ")))
        })
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(_) => get_env_parse(name),
        None => Ok(default),
    }
}

/// Webhook path segment derived from the token, so the token itself never
/// shows up in request URIs.
pub fn default_webhook_path(bot_token: &str) -> String {
    hex::encode(Sha256::digest(bot_token.as_bytes()))
}

/// Positive number of seconds, bounded by `u32`.
fn parse_max_age(name: &str, raw: &str) -> Result<Duration> {
    let secs: u32 = raw
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))?;
    if secs == 0 {
        return Err(Error::Config(format!("Invalid value for {}: must be positive", name)));
    }
    Ok(Duration::seconds(i64::from(secs)))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_parse_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmProvider>(), Ok(LlmProvider::OpenAi));
        assert_eq!(" gemini ".parse::<LlmProvider>(), Ok(LlmProvider::Gemini));
        assert!("claude".parse::<LlmProvider>().is_err());
        assert_eq!("POLLING".parse::<DeliveryMode>(), Ok(DeliveryMode::Polling));
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins("https://a.example/, https://b.example ,,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(parse_origins("*"), vec!["*"]);
    }

    #[test]
    fn max_age_must_be_a_positive_bounded_number() {
        assert_eq!(
            parse_max_age("INIT_DATA_MAX_AGE_SECS", " 3600 ").unwrap(),
            Duration::hours(1)
        );
        for bad in ["0", "-5", "9223372036854775807", "4294967296", "soon"] {
            assert!(
                matches!(parse_max_age("INIT_DATA_MAX_AGE_SECS", bad), Err(Error::Config(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn default_webhook_path_does_not_contain_token() {
        let path = default_webhook_path("123456:SECRET-TOKEN");
        assert_eq!(path.len(), 64);
        assert!(!path.contains("SECRET"));
        assert!(!path.contains(':'));
        assert_eq!(path, default_webhook_path("123456:SECRET-TOKEN"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = Config {
            server_address: "0.0.0.0:10000".into(),
            database_url: "postgres://user:pw@db/bot".into(),
            telegram_bot_token: "123:SECRET".into(),
            llm_provider: LlmProvider::OpenAi,
            llm_api_key: "sk-SECRET".into(),
            llm_model: "gpt-4o-mini".into(),
            public_url: Some("https://bot.example".into()),
            delivery_mode: DeliveryMode::Webhook,
            webhook_path: "123:SECRET".into(),
            webhook_secret: Some("SECRET".into()),
            webapp_url: None,
            owner_chat_id: None,
            daily_message_limit: 30,
            history_limit: 10,
            init_data_max_age: None,
            cors_allowed_origins: vec!["*".into()],
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("SECRET"));
        assert!(!printed.contains("pw@"));
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://bot.example/webhook/123:SECRET")
        );
    }
}
