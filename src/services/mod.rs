pub mod ai_service;
pub mod bot_service;
pub mod lead_service;
pub mod message_service;
pub mod notification_service;
pub mod polling_service;
pub mod quota_service;
pub mod telegram_service;
