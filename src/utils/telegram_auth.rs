//! Verification of Telegram Mini-App `initData` payloads.
//!
//! Telegram signs the init data it hands to a Mini-App with a key derived from
//! the bot token: `secret = HMAC_SHA256(key = "WebAppData", msg = bot_token)`
//! and `hash = hex(HMAC_SHA256(key = secret, msg = data_check_string))`, where
//! the data-check string is every field except `hash`, sorted by name and
//! rendered as `name=value` lines joined with `\n`.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";
const HASH_FIELD: &str = "hash";
const USER_FIELD: &str = "user";
const AUTH_DATE_FIELD: &str = "auth_date";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitDataError {
    #[error("init data is empty")]
    Empty,

    #[error("init data has no hash field")]
    MissingHash,

    #[error("init data has no fields besides hash")]
    NoFields,

    #[error("init data signature does not match")]
    SignatureMismatch,

    #[error("init data user field is malformed: {0}")]
    MalformedUser(String),

    #[error("init data auth_date is missing or invalid")]
    InvalidAuthDate,

    #[error("init data expired {age_secs}s after signing")]
    Expired { age_secs: i64 },
}

/// The `user` object embedded in init data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: Option<bool>,
    pub allows_write_to_pm: Option<bool>,
    pub photo_url: Option<String>,
}

impl WebAppUser {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// Init data that passed signature verification. `fields` no longer contains `hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInitData {
    pub fields: BTreeMap<String, String>,
    pub user: Option<WebAppUser>,
}

impl ParsedInitData {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn auth_date(&self) -> Option<DateTime<Utc>> {
        let secs = self.get(AUTH_DATE_FIELD)?.parse::<i64>().ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

/// Verifier bound to one bot token. The derived secret lives only in memory.
#[derive(Clone)]
pub struct InitDataVerifier {
    secret: [u8; 32],
}

impl std::fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitDataVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl InitDataVerifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            secret: hmac_sha256(WEB_APP_DATA_KEY, bot_token.as_bytes()),
        }
    }

    /// Lowercase hex signature Telegram would attach to `data_check_string`.
    pub fn signature(&self, data_check_string: &str) -> String {
        hex::encode(hmac_sha256(&self.secret, data_check_string.as_bytes()))
    }

    pub fn verify(&self, raw_init_data: &str) -> Result<ParsedInitData, InitDataError> {
        if raw_init_data.trim().is_empty() {
            return Err(InitDataError::Empty);
        }

        let mut fields = parse_fields(raw_init_data);
        let provided_hash = fields.remove(HASH_FIELD).ok_or(InitDataError::MissingHash)?;
        if fields.is_empty() {
            return Err(InitDataError::NoFields);
        }

        let expected = self.signature(&data_check_string(&fields));
        let matches: bool = expected
            .as_bytes()
            .ct_eq(provided_hash.as_bytes())
            .into();
        if !matches {
            return Err(InitDataError::SignatureMismatch);
        }

        let user = match fields.get(USER_FIELD) {
            Some(raw_user) => Some(
                serde_json::from_str::<WebAppUser>(raw_user)
                    .map_err(|e| InitDataError::MalformedUser(e.to_string()))?,
            ),
            None => None,
        };

        Ok(ParsedInitData { fields, user })
    }
}

/// Verifies `raw_init_data` against `bot_token`.
pub fn verify(raw_init_data: &str, bot_token: &str) -> Result<ParsedInitData, InitDataError> {
    InitDataVerifier::new(bot_token).verify(raw_init_data)
}

/// Rejects init data whose `auth_date` is older than `max_age` at `now`.
/// Timestamps slightly in the future are accepted.
pub fn check_freshness(
    parsed: &ParsedInitData,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<(), InitDataError> {
    let signed_at = parsed.auth_date().ok_or(InitDataError::InvalidAuthDate)?;
    let age = now.signed_duration_since(signed_at);
    if age > max_age {
        return Err(InitDataError::Expired {
            age_secs: age.num_seconds(),
        });
    }
    Ok(())
}

/// Decodes `key=value&...` pairs. Later duplicates overwrite earlier ones.
pub fn parse_fields(raw: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// `name=value` lines in byte order of `name`, joined by `\n`.
pub fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(msg);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "T";
    const ANN: &str = "auth_date=1700000000&query_id=AAA&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ann%22%7D";

    fn sign(raw: &str, token: &str) -> String {
        let fields = parse_fields(raw);
        let hash = InitDataVerifier::new(token).signature(&data_check_string(&fields));
        format!("{}&hash={}", raw, hash)
    }

    fn with_hash(raw_signed: &str, f: impl FnOnce(&str) -> String) -> String {
        let (body, hash) = raw_signed.rsplit_once("&hash=").unwrap();
        format!("{}&hash={}", body, f(hash))
    }

    #[test]
    fn verifies_signed_payload_and_returns_user() {
        let parsed = verify(&sign(ANN, TOKEN), TOKEN).unwrap();
        let user = parsed.user.clone().unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.first_name, "Ann");
        assert_eq!(user.username, None);
        assert_eq!(parsed.get("query_id"), Some("AAA"));
        assert!(parsed.get("hash").is_none());
        assert_eq!(parsed.auth_date().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn data_check_string_is_sorted_and_decoded() {
        let fields = parse_fields(ANN);
        assert_eq!(
            data_check_string(&fields),
            "auth_date=1700000000\nquery_id=AAA\nuser={\"id\":42,\"first_name\":\"Ann\"}"
        );
    }

    #[test]
    fn altered_last_digit_is_rejected() {
        let tampered = with_hash(&sign(ANN, TOKEN), |hash| {
            let mut chars: Vec<char> = hash.chars().collect();
            let last = chars.last_mut().unwrap();
            *last = if *last == '0' { '1' } else { '0' };
            chars.into_iter().collect()
        });
        assert_eq!(verify(&tampered, TOKEN), Err(InitDataError::SignatureMismatch));
    }

    #[test]
    fn any_single_flipped_hash_char_is_rejected() {
        let signed = sign(ANN, TOKEN);
        let (_, hash) = signed.rsplit_once("&hash=").unwrap();
        for i in 0..hash.len() {
            let tampered = with_hash(&signed, |h| {
                let mut bytes = h.as_bytes().to_vec();
                bytes[i] = if bytes[i] == b'a' { b'b' } else { b'a' };
                String::from_utf8(bytes).unwrap()
            });
            assert_eq!(
                verify(&tampered, TOKEN),
                Err(InitDataError::SignatureMismatch),
                "position {}",
                i
            );
        }
    }

    #[test]
    fn uppercase_hash_is_not_accepted() {
        let upper = with_hash(&sign(ANN, TOKEN), |h| h.to_uppercase());
        assert_eq!(verify(&upper, TOKEN), Err(InitDataError::SignatureMismatch));
    }

    #[test]
    fn missing_hash_fails_before_signature_check() {
        assert_eq!(verify(ANN, TOKEN), Err(InitDataError::MissingHash));
    }

    #[test]
    fn empty_and_hash_only_inputs_are_rejected() {
        assert_eq!(verify("", TOKEN), Err(InitDataError::Empty));
        assert_eq!(verify("hash=abcdef", TOKEN), Err(InitDataError::NoFields));
    }

    #[test]
    fn field_order_does_not_matter() {
        let signed = sign(ANN, TOKEN);
        let hash = signed.rsplit_once("&hash=").unwrap().1;
        let reordered = format!(
            "hash={}&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ann%22%7D&query_id=AAA&auth_date=1700000000",
            hash
        );
        let parsed = verify(&reordered, TOKEN).unwrap();
        assert_eq!(parsed.user.unwrap().id, 42);
    }

    #[test]
    fn last_duplicate_wins() {
        let signed = sign(ANN, TOKEN);
        let shadowed = format!("query_id=ZZZ&{}", signed);
        assert_eq!(verify(&shadowed, TOKEN).unwrap().get("query_id"), Some("AAA"));

        let overriding = format!("{}&query_id=ZZZ", signed);
        assert_eq!(
            verify(&overriding, TOKEN),
            Err(InitDataError::SignatureMismatch)
        );
    }

    #[test]
    fn payload_for_another_token_is_rejected() {
        let signed = sign(ANN, "token-a");
        assert!(verify(&signed, "token-a").is_ok());
        assert_eq!(
            verify(&signed, "token-b"),
            Err(InitDataError::SignatureMismatch)
        );
    }

    #[test]
    fn malformed_user_json_is_its_own_error() {
        let signed = sign("auth_date=1700000000&user=%7Bnot-json", TOKEN);
        assert!(matches!(
            verify(&signed, TOKEN),
            Err(InitDataError::MalformedUser(_))
        ));
    }

    #[test]
    fn payload_without_user_verifies_with_no_user() {
        let signed = sign("auth_date=1700000000&query_id=AAA", TOKEN);
        let parsed = verify(&signed, TOKEN).unwrap();
        assert!(parsed.user.is_none());
    }

    #[test]
    fn full_user_record_is_decoded() {
        let raw = "auth_date=1700000000&user=%7B%22id%22%3A7%2C%22first_name%22%3A%22Bo%22%2C%22last_name%22%3A%22Li%22%2C%22username%22%3A%22boli%22%2C%22is_premium%22%3Atrue%7D";
        let user = verify(&sign(raw, TOKEN), TOKEN).unwrap().user.unwrap();
        assert_eq!(user.username.as_deref(), Some("boli"));
        assert_eq!(user.is_premium, Some(true));
        assert_eq!(user.display_name(), "Bo Li");
    }

    #[test]
    fn errors_never_contain_the_token() {
        let token = "123456:SECRET-TOKEN";
        let signed = sign("auth_date=1&user=%7Bbad", token);
        for result in [
            verify(&signed, token),
            verify(&signed, "other"),
            verify("auth_date=1", token),
        ] {
            let message = result.unwrap_err().to_string();
            assert!(!message.contains(token));
        }
        assert!(!format!("{:?}", InitDataVerifier::new(token)).contains("SECRET"));
    }

    #[test]
    fn freshness_is_checked_against_auth_date() {
        let parsed = verify(&sign(ANN, TOKEN), TOKEN).unwrap();
        let signed_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let fresh = signed_at + Duration::minutes(5);
        assert!(check_freshness(&parsed, Duration::hours(1), fresh).is_ok());

        let stale = signed_at + Duration::hours(2);
        assert_eq!(
            check_freshness(&parsed, Duration::hours(1), stale),
            Err(InitDataError::Expired { age_secs: 7200 })
        );

        let no_date = verify(&sign("query_id=AAA", TOKEN), TOKEN).unwrap();
        assert_eq!(
            check_freshness(&no_date, Duration::hours(1), fresh),
            Err(InitDataError::InvalidAuthDate)
        );
    }
}
