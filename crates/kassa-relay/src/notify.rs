use std::sync::Arc;

use tracing::debug;

use crate::retry::{send_html_with_retry, send_with_retry};
use crate::Transport;

/// Fan-out of outcome messages to the three audiences: the payer, the
/// operator chat, and the structured notification channel. All sends are
/// best-effort — a lost notification never fails the operation that
/// produced it.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn Transport>,
    operator_chat: i64,
    notify_channel: Option<i64>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn Transport>, operator_chat: i64, notify_channel: Option<i64>) -> Self {
        Self {
            transport,
            operator_chat,
            notify_channel,
        }
    }

    pub async fn payer(&self, user_id: i64, text: &str) {
        send_with_retry(self.transport.as_ref(), user_id, text).await;
    }

    pub async fn operator(&self, text: &str) {
        send_with_retry(self.transport.as_ref(), self.operator_chat, text).await;
    }

    /// Structured summaries go to the notification channel when one is
    /// configured, otherwise to the operator chat.
    pub async fn channel(&self, html: &str) {
        let chat = self.notify_channel.unwrap_or(self.operator_chat);
        send_html_with_retry(self.transport.as_ref(), chat, html).await;
    }

    /// Remove the keyboard of an earlier notice. Single attempt; cleanup
    /// is cosmetic.
    pub async fn clear_markup(&self, chat_id: i64, message_id: i64) {
        if let Err(e) = self.transport.clear_reply_markup(chat_id, message_id).await {
            debug!("keyboard cleanup skipped: {}", e);
        }
    }
}
