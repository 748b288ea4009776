use crate::error::Result;
use crate::models::message::{CreateMessage, Message, MessageRole};
use crate::services::ai_service::ChatTurn;
use sqlx::PgPool;

#[derive(Clone)]
pub struct MessageService {
    pool: PgPool,
}

impl MessageService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, msg: CreateMessage) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (chat_id, telegram_id, role, text)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(msg.chat_id)
        .bind(msg.telegram_id)
        .bind(msg.role.as_str())
        .bind(&msg.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    /// Latest `limit` messages of a chat, oldest first.
    pub async fn recent(&self, chat_id: i64, limit: i64) -> Result<Vec<Message>> {
        let mut messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE chat_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(chat_id)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    pub async fn clear(&self, chat_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE chat_id = $1")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Turns stored messages into model turns. A conversation sent to the model
/// must open with a user turn, so leading assistant messages are dropped.
pub fn to_turns(messages: &[Message]) -> Vec<ChatTurn> {
    messages
        .iter()
        .filter_map(|m| {
            let role = match m.role.as_str() {
                "user" => MessageRole::User,
                "assistant" => MessageRole::Assistant,
                _ => return None,
            };
            Some(ChatTurn {
                role,
                text: m.text.clone(),
            })
        })
        .skip_while(|turn| turn.role != MessageRole::User)
        .collect()
}
