pub mod client;
pub mod notify;
pub mod retry;

use anyhow::Result;
use async_trait::async_trait;

pub use client::RelayClient;
pub use notify::Notifier;

/// Where a sent message landed; kept when the message may need to be
/// edited or deleted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// The messaging layer, reduced to what the core needs: deliver text to a
/// recipient and clean up earlier messages. Everything behind it —
/// keyboards, menus, media — belongs to the relay collaborator.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef>;

    /// Send with relay-side rich formatting enabled.
    async fn send_html(&self, chat_id: i64, text: &str) -> Result<MessageRef>;

    /// Remove the inline keyboard from an earlier message without
    /// touching its content.
    async fn clear_reply_markup(&self, chat_id: i64, message_id: i64) -> Result<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;
}
