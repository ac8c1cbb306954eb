use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{MessageRef, Transport};

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the relay's bot endpoint.
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Serialize)]
struct EditReplyMarkup {
    chat_id: i64,
    message_id: i64,
    reply_markup: serde_json::Value,
}

#[derive(Serialize)]
struct DeleteMessage {
    chat_id: i64,
    message_id: i64,
}

#[derive(Deserialize)]
struct RelayResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .expect("reqwest client");
        let base_url = format!("{}/bot{}", base_url.into().trim_end_matches('/'), token);
        Self { client, base_url }
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B) -> Result<RelayResponse> {
        let url = format!("{}/{}", self.base_url, method);
        let response: RelayResponse = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("relay {method} transport error"))?
            .json()
            .await
            .with_context(|| format!("relay {method} malformed response"))?;

        if !response.ok {
            bail!(
                "relay {method} rejected: {}",
                response.description.unwrap_or_else(|| "no description".into())
            );
        }
        Ok(response)
    }

    async fn send(&self, chat_id: i64, text: &str, parse_mode: Option<&str>) -> Result<MessageRef> {
        let response = self
            .call("sendMessage", &SendMessage { chat_id, text, parse_mode })
            .await?;
        let message_id = response.result.map(|m| m.message_id).unwrap_or_default();
        Ok(MessageRef { chat_id, message_id })
    }
}

#[async_trait]
impl Transport for RelayClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef> {
        self.send(chat_id, text, None).await
    }

    async fn send_html(&self, chat_id: i64, text: &str) -> Result<MessageRef> {
        self.send(chat_id, text, Some("HTML")).await
    }

    async fn clear_reply_markup(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.call(
            "editMessageReplyMarkup",
            &EditReplyMarkup {
                chat_id,
                message_id,
                reply_markup: serde_json::json!({}),
            },
        )
        .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.call("deleteMessage", &DeleteMessage { chat_id, message_id }).await?;
        Ok(())
    }
}
