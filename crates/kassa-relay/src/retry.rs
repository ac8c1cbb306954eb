//! Retry policy for non-financial sends. A notification that cannot be
//! delivered after the attempt budget is dropped, not queued: the ledger
//! already holds the truth, and a stale notice is worse than none.

use std::time::Duration;

use tracing::debug;

use crate::{MessageRef, Transport};

pub const SEND_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(250);

/// Send plain text, retrying transient failures with capped exponential
/// backoff. Returns `None` after the budget is spent.
pub async fn send_with_retry(
    transport: &dyn Transport,
    chat_id: i64,
    text: &str,
) -> Option<MessageRef> {
    with_retry(|| transport.send_message(chat_id, text)).await
}

/// HTML variant of [`send_with_retry`].
pub async fn send_html_with_retry(
    transport: &dyn Transport,
    chat_id: i64,
    text: &str,
) -> Option<MessageRef> {
    with_retry(|| transport.send_html(chat_id, text)).await
}

async fn with_retry<F, Fut>(mut op: F) -> Option<MessageRef>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<MessageRef>>,
{
    let mut delay = BASE_DELAY;
    for attempt in 1..=SEND_ATTEMPTS {
        match op().await {
            Ok(sent) => return Some(sent),
            Err(e) if attempt == SEND_ATTEMPTS => {
                debug!("send dropped after {} attempts: {}", SEND_ATTEMPTS, e);
            }
            Err(e) => {
                debug!("send attempt {} failed, retrying: {}", attempt, e);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::bail;
    use async_trait::async_trait;

    use super::*;
    use crate::Transport;

    /// Fails the first `fail_first` sends, then delivers.
    struct FlakyTransport {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl FlakyTransport {
        fn new(fail_first: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send_message(&self, chat_id: i64, _text: &str) -> anyhow::Result<MessageRef> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                bail!("relay hiccup");
            }
            Ok(MessageRef { chat_id, message_id: 1 })
        }

        async fn send_html(&self, chat_id: i64, text: &str) -> anyhow::Result<MessageRef> {
            self.send_message(chat_id, text).await
        }

        async fn clear_reply_markup(&self, _chat_id: i64, _message_id: i64) -> anyhow::Result<()> {
            Ok(())
        }

        async fn delete_message(&self, _chat_id: i64, _message_id: i64) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let transport = FlakyTransport::new(2);
        let sent = send_with_retry(&transport, 7, "hello").await;
        assert_eq!(sent, Some(MessageRef { chat_id: 7, message_id: 1 }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn the_attempt_budget_caps_and_drops() {
        let transport = FlakyTransport::new(usize::MAX);
        let sent = send_with_retry(&transport, 7, "hello").await;
        assert!(sent.is_none());
        assert_eq!(transport.calls.load(Ordering::SeqCst), SEND_ATTEMPTS as usize);
    }
}
