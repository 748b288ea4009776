use crate::error::Result;
use crate::models::lead::{CreateLead, Lead};
use sqlx::{PgPool, Row};

pub const MINIAPP_SOURCE: &str = "miniapp";

#[derive(Clone)]
pub struct LeadService {
    pool: PgPool,
}

impl LeadService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_user(
        &self,
        telegram_id: i64,
        first_name: &str,
        username: Option<&str>,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        upsert_user_with(&mut conn, telegram_id, first_name, username).await
    }

    /// Stores the user and the lead atomically.
    pub async fn record_lead(
        &self,
        first_name: &str,
        username: Option<&str>,
        lead: CreateLead,
    ) -> Result<(Lead, bool)> {
        let mut tx = self.pool.begin().await?;

        let is_new = upsert_user_with(&mut tx, lead.telegram_id, first_name, username).await?;

        let stored = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (telegram_id, name, niche, contact, source)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(lead.telegram_id)
        .bind(&lead.name)
        .bind(&lead.niche)
        .bind(&lead.contact)
        .bind(&lead.source)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((stored, is_new))
    }
}

async fn upsert_user_with(
    conn: &mut sqlx::PgConnection,
    telegram_id: i64,
    first_name: &str,
    username: Option<&str>,
) -> Result<bool> {
    // xmax is zero only for rows this statement inserted.
    let row = sqlx::query(
        r#"
        INSERT INTO bot_users (telegram_id, first_name, username)
        VALUES ($1, $2, $3)
        ON CONFLICT (telegram_id) DO UPDATE
        SET first_name = EXCLUDED.first_name,
            username = EXCLUDED.username,
            last_seen_at = NOW()
        RETURNING (xmax = 0) AS inserted
        "#,
    )
    .bind(telegram_id)
    .bind(first_name)
    .bind(username)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.try_get("inserted")?)
}
