use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub telegram_id: i64,
    pub name: String,
    pub niche: Option<String>,
    pub contact: Option<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateLead {
    pub telegram_id: i64,
    pub name: String,
    pub niche: Option<String>,
    pub contact: Option<String>,
    pub source: String,
}
