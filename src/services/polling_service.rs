use crate::dto::telegram_dto::TelegramUpdate;
use crate::error::Result;
use crate::services::{bot_service::BotService, telegram_service::TelegramService};

pub const POLL_TIMEOUT_SECS: u64 = 30;

/// Long-polls `getUpdates` when the bot runs without a webhook.
pub struct PollingService {
    telegram: TelegramService,
    bot: BotService,
    offset: i64,
}

impl PollingService {
    pub fn new(telegram: TelegramService, bot: BotService) -> Self {
        Self {
            telegram,
            bot,
            offset: 0,
        }
    }

    /// Fetches and handles one batch; returns how many updates it saw.
    pub async fn run_once(&mut self) -> Result<usize> {
        let updates = self
            .telegram
            .get_updates(self.offset, POLL_TIMEOUT_SECS)
            .await?;
        self.offset = next_offset(self.offset, &updates);

        let count = updates.len();
        for update in updates {
            let update_id = update.update_id;
            if let Err(e) = self.bot.handle_update(update).await {
                tracing::error!(update_id, error = %e, "failed to handle update");
            }
        }
        Ok(count)
    }
}

/// Offset that acknowledges every update in `updates`.
pub fn next_offset(current: i64, updates: &[TelegramUpdate]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .fold(current, i64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: i64) -> TelegramUpdate {
        TelegramUpdate {
            update_id: id,
            message: None,
        }
    }

    #[test]
    fn offset_moves_past_highest_update() {
        assert_eq!(next_offset(0, &[update(5), update(7), update(6)]), 8);
        assert_eq!(next_offset(10, &[]), 10);
        assert_eq!(next_offset(10, &[update(3)]), 10);
    }
}
