use crate::dto::telegram_dto::TelegramUser;
use crate::error::Result;
use crate::models::lead::Lead;
use crate::services::telegram_service::TelegramService;
use crate::utils::telegram_auth::WebAppUser;

/// Sends operational notices to the bot owner's chat, when one is configured.
#[derive(Clone)]
pub struct NotificationService {
    telegram: TelegramService,
    owner_chat_id: Option<i64>,
}

impl NotificationService {
    pub fn new(telegram: TelegramService, owner_chat_id: Option<i64>) -> Self {
        Self {
            telegram,
            owner_chat_id,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.owner_chat_id.is_some()
    }

    pub async fn notify_new_lead(&self, lead: &Lead, user: &WebAppUser) -> Result<()> {
        self.send(&format_lead(lead, user)).await
    }

    pub async fn notify_new_user(&self, user: &TelegramUser) -> Result<()> {
        self.send(&format_new_user(user)).await
    }

    async fn send(&self, text: &str) -> Result<()> {
        let Some(chat_id) = self.owner_chat_id else {
            return Ok(());
        };
        self.telegram.send_message(chat_id, text, None).await
    }
}

fn handle(username: Option<&str>) -> String {
    username.map(|u| format!("@{}", u)).unwrap_or_else(|| "—".to_string())
}

pub fn format_lead(lead: &Lead, user: &WebAppUser) -> String {
    format!(
        "🆕 Новая заявка из Mini App\n\
         Имя: {}\n\
         Ниша: {}\n\
         Контакт: {}\n\
         Telegram: {} (id {})",
        lead.name,
        lead.niche.as_deref().unwrap_or("—"),
        lead.contact.as_deref().unwrap_or("—"),
        handle(user.username.as_deref()),
        user.id,
    )
}

pub fn format_new_user(user: &TelegramUser) -> String {
    let name = match &user.last_name {
        Some(last) => format!("{} {}", user.first_name, last),
        None => user.first_name.clone(),
    };
    format!(
        "👤 Новый пользователь: {} {} (id {})",
        name,
        handle(user.username.as_deref()),
        user.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn lead_summary_lists_form_and_identity() {
        let lead = Lead {
            id: Uuid::new_v4(),
            telegram_id: 42,
            name: "Ann".into(),
            niche: Some("coffee".into()),
            contact: None,
            source: "miniapp".into(),
            created_at: Utc::now(),
        };
        let user = WebAppUser {
            id: 42,
            first_name: "Ann".into(),
            last_name: None,
            username: Some("ann".into()),
            language_code: None,
            is_premium: None,
            allows_write_to_pm: None,
            photo_url: None,
        };
        let text = format_lead(&lead, &user);
        assert!(text.contains("Имя: Ann"));
        assert!(text.contains("Ниша: coffee"));
        assert!(text.contains("Контакт: —"));
        assert!(text.contains("@ann (id 42)"));
    }

    #[test]
    fn new_user_without_username() {
        let user = TelegramUser {
            id: 7,
            is_bot: false,
            first_name: "Bo".into(),
            last_name: Some("Li".into()),
            username: None,
        };
        assert_eq!(format_new_user(&user), "👤 Новый пользователь: Bo Li — (id 7)");
    }
}
