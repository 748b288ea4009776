use crate::dto::telegram_dto::{InlineKeyboardMarkup, TelegramUpdate, TelegramUser};
use crate::error::Result;
use crate::models::message::{CreateMessage, MessageRole};
use crate::services::{
    ai_service::AIService,
    lead_service::LeadService,
    message_service::{to_turns, MessageService},
    notification_service::NotificationService,
    quota_service::QuotaService,
    telegram_service::TelegramService,
};
use tracing::{error, info, warn};

pub const GREETING: &str = "Привет! Я AI-ассистент. Задай вопрос.";
pub const GREETING_WITH_APP: &str =
    "Привет! Я AI-ассистент. Задай вопрос или оставь заявку через приложение ниже.";
pub const APP_BUTTON: &str = "Оставить заявку";
pub const HELP: &str = "Просто напишите вопрос, и я отвечу.\n\
/start — начать заново\n\
/reset — очистить историю диалога\n\
/help — эта подсказка";
pub const RESET_DONE: &str = "История диалога очищена.";
pub const UNKNOWN_COMMAND: &str = "Неизвестная команда. Используйте /help.";
pub const LIMIT_REACHED: &str =
    "Дневной лимит сообщений исчерпан. Попробуйте снова завтра.";
pub const GENERIC_ERROR: &str = "Произошла ошибка. Попробуйте позже.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Reset,
    Unknown(String),
}

/// Recognises `/command` and `/command@botname` at the start of a message.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.trim_start().split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    Some(match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "reset" => Command::Reset,
        other => Command::Unknown(other.to_string()),
    })
}

#[derive(Clone)]
pub struct BotService {
    telegram: TelegramService,
    ai: AIService,
    messages: MessageService,
    quota: QuotaService,
    leads: LeadService,
    notifications: NotificationService,
    webapp_url: Option<String>,
    history_limit: i64,
}

impl BotService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        telegram: TelegramService,
        ai: AIService,
        messages: MessageService,
        quota: QuotaService,
        leads: LeadService,
        notifications: NotificationService,
        webapp_url: Option<String>,
        history_limit: i64,
    ) -> Self {
        Self {
            telegram,
            ai,
            messages,
            quota,
            leads,
            notifications,
            webapp_url,
            history_limit,
        }
    }

    pub async fn handle_update(&self, update: TelegramUpdate) -> Result<()> {
        let Some(message) = update.message else {
            return Ok(());
        };
        let (Some(text), Some(from)) = (message.text.as_deref(), message.from.as_ref()) else {
            return Ok(());
        };
        if from.is_bot {
            return Ok(());
        }
        let chat_id = message.chat.id;

        match parse_command(text) {
            Some(Command::Start) => self.handle_start(chat_id, from).await,
            Some(Command::Help) => self.telegram.send_message(chat_id, HELP, None).await,
            Some(Command::Reset) => {
                let removed = self.messages.clear(chat_id).await?;
                info!(chat_id, removed, "conversation history cleared");
                self.telegram.send_message(chat_id, RESET_DONE, None).await
            }
            Some(Command::Unknown(name)) => {
                info!(chat_id, command = %name, "unknown command");
                self.telegram.send_message(chat_id, UNKNOWN_COMMAND, None).await
            }
            None => self.handle_text(chat_id, from, text).await,
        }
    }

    async fn handle_start(&self, chat_id: i64, from: &TelegramUser) -> Result<()> {
        info!("Handling /start from user id {}", from.id);

        match self
            .leads
            .upsert_user(from.id, &from.first_name, from.username.as_deref())
            .await
        {
            Ok(true) if self.notifications.is_enabled() => {
                let notifications = self.notifications.clone();
                let user = from.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifications.notify_new_user(&user).await {
                        warn!("Failed to notify owner about new user: {}", e);
                    }
                });
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to store bot user {}: {}", from.id, e),
        }

        match &self.webapp_url {
            Some(url) => {
                let markup = InlineKeyboardMarkup::web_app_button(APP_BUTTON, url);
                self.telegram
                    .send_message(chat_id, GREETING_WITH_APP, Some(&markup))
                    .await
            }
            None => self.telegram.send_message(chat_id, GREETING, None).await,
        }
    }

    async fn handle_text(&self, chat_id: i64, from: &TelegramUser, text: &str) -> Result<()> {
        if let Err(e) = self.converse(chat_id, from, text).await {
            error!(chat_id, error = %e, "failed to answer message");
            return self.telegram.send_message(chat_id, GENERIC_ERROR, None).await;
        }
        Ok(())
    }

    async fn converse(&self, chat_id: i64, from: &TelegramUser, text: &str) -> Result<()> {
        let quota = self.quota.consume(from.id).await?;
        if !quota.allowed {
            info!(user_id = from.id, used = quota.used, limit = quota.limit, "daily limit reached");
            return self.telegram.send_message(chat_id, LIMIT_REACHED, None).await;
        }

        if let Err(e) = self.telegram.send_typing(chat_id).await {
            warn!("Failed to send typing action: {}", e);
        }

        self.messages
            .create(CreateMessage {
                chat_id,
                telegram_id: from.id,
                role: MessageRole::User,
                text: text.to_string(),
            })
            .await?;

        let stored = self.messages.recent(chat_id, self.history_limit).await?;
        let turns = to_turns(&stored);
        let reply = self.ai.reply(&turns).await?;

        self.messages
            .create(CreateMessage {
                chat_id,
                telegram_id: from.id,
                role: MessageRole::Assistant,
                text: reply.clone(),
            })
            .await?;

        self.telegram.send_long_message(chat_id, &reply).await
    }
}
