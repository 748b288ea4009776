use crate::error::Result;
use crate::utils::time::today_utc;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub used: i32,
    pub limit: i32,
}

/// Per-user daily message counter. A non-positive limit disables the quota.
#[derive(Clone)]
pub struct QuotaService {
    pool: PgPool,
    daily_limit: i32,
}

impl QuotaService {
    pub fn new(pool: PgPool, daily_limit: i32) -> Self {
        Self { pool, daily_limit }
    }

    /// Counts one message for `telegram_id` today and reports whether it fits the quota.
    pub async fn consume(&self, telegram_id: i64) -> Result<QuotaDecision> {
        if self.daily_limit <= 0 {
            return Ok(QuotaDecision {
                allowed: true,
                used: 0,
                limit: self.daily_limit,
            });
        }

        let (used,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO daily_usage (telegram_id, usage_date, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (telegram_id, usage_date)
            DO UPDATE SET count = daily_usage.count + 1
            RETURNING count
            "#,
        )
        .bind(telegram_id)
        .bind(today_utc())
        .fetch_one(&self.pool)
        .await?;

        Ok(decide(used, self.daily_limit))
    }
}

pub fn decide(used: i32, limit: i32) -> QuotaDecision {
    QuotaDecision {
        allowed: limit <= 0 || used <= limit,
        used,
        limit,
    }
}
