pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    ai_service::AIService, bot_service::BotService, lead_service::LeadService,
    message_service::MessageService, notification_service::NotificationService,
    quota_service::QuotaService, telegram_service::TelegramService,
};
use crate::utils::telegram_auth::InitDataVerifier;
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub telegram_service: TelegramService,
    pub ai_service: AIService,
    pub lead_service: LeadService,
    pub message_service: MessageService,
    pub quota_service: QuotaService,
    pub notification_service: NotificationService,
    pub bot_service: BotService,
    pub init_data_verifier: InitDataVerifier,
}

impl AppState {
    pub fn new(pool: PgPool) -> error::Result<Self> {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let telegram_service =
            TelegramService::new(config.telegram_bot_token.clone(), http_client.clone());
        let ai_service = AIService::new(
            config.llm_provider,
            config.llm_api_key.clone(),
            config.llm_model.clone(),
            http_client,
        );
        let lead_service = LeadService::new(pool.clone());
        let message_service = MessageService::new(pool.clone());
        let quota_service = QuotaService::new(pool.clone(), config.daily_message_limit);
        let notification_service =
            NotificationService::new(telegram_service.clone(), config.owner_chat_id);
        let bot_service = BotService::new(
            telegram_service.clone(),
            ai_service.clone(),
            message_service.clone(),
            quota_service.clone(),
            lead_service.clone(),
            notification_service.clone(),
            config.webapp_url.clone(),
            config.history_limit,
        );
        let init_data_verifier = InitDataVerifier::new(&config.telegram_bot_token);

        Ok(Self {
            pool,
            telegram_service,
            ai_service,
            lead_service,
            message_service,
            quota_service,
            notification_service,
            bot_service,
            init_data_verifier,
        })
    }
}
