use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sgpr_common::DestinationId;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::TelegramConfig;
use crate::module::delivery::DeliveryChannel;
use crate::module::handler::AdminHandler;

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram api error {code:?}: {description}")]
    Api { code: Option<i64>, description: String },
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct User {
    pub id: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Serialize, Debug)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize, Debug)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// Telegram Bot API client used both for deliveries and for the admin
/// command long poll.
pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout: u64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig, request_timeout: Duration) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent("sgprapp-bot/1.0")
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.api_url.trim_end_matches('/'), config.token),
            poll_timeout: config.poll_timeout_seconds,
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Option<Duration>) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(format!("{}/{}", self.base_url, method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response: ApiResponse<T> = request.send().await?.json().await?;
        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                code: response.error_code,
                description: response
                    .description
                    .unwrap_or_else(|| format!("{} returned no result", method)),
            }),
        }
    }

    /// Send an HTML formatted message
    pub async fn send_message(&self, chat_id: &str, html: &str) -> Result<(), TelegramError> {
        let body = SendMessageRequest {
            chat_id,
            text: html,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let _: serde_json::Value = self.call("sendMessage", &body, None).await?;
        Ok(())
    }

    /// Long poll for message updates after `offset`
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout,
            allowed_updates: ["message"],
        };
        let timeout = Duration::from_secs(self.poll_timeout + 10);
        self.call("getUpdates", &body, Some(timeout)).await
    }

    /// Start the admin command poll loop
    pub fn start_polling(self: Arc<Self>, handler: Arc<AdminHandler>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Telegram command polling started");
            let mut offset = None;

            loop {
                let updates = match self.get_updates(offset).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        tracing::warn!("getUpdates failed: {}. Retrying in {}s", e, POLL_RETRY_DELAY.as_secs());
                        sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = Some(update.update_id + 1);
                    self.dispatch(&handler, update).await;
                }
            }
        })
    }

    async fn dispatch(&self, handler: &AdminHandler, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let (Some(from), Some(text)) = (message.from, message.text) else {
            return;
        };

        let chat = DestinationId::from(message.chat.id);
        if let Some(reply) = handler.handle(from.id, &chat, &text).await {
            if let Err(e) = self.send_message(chat.as_str(), &reply).await {
                tracing::warn!("Failed to reply to {}: {}", chat, e);
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramClient {
    async fn send(&self, destination: &DestinationId, text: &str) -> anyhow::Result<()> {
        self.send_message(destination.as_str(), text).await?;
        Ok(())
    }
}
