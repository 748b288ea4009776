pub mod lead_dto;
pub mod telegram_dto;
