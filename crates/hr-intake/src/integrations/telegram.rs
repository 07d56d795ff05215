//! Telegram Bot API client and translation of raw updates into intake events.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::BotConfig;
use crate::workflows::intake::{
    BotCommand, ChatError, ChatGateway, ChatId, EventKind, IncomingEvent, InlineKeyboard,
    OutgoingMessage, UserIdentity,
};

/// Long-poll window requested from `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(POLL_TIMEOUT_SECS + 15);

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Turns an update into the event the conversation driver understands. Updates the bot
/// does not handle (edits, channel posts, messages without a sender) yield `None`.
pub fn event_from_update(update: Update) -> Option<IncomingEvent> {
    if let Some(query) = update.callback_query {
        let chat = query
            .message
            .as_ref()
            .map(|message| message.chat.id)
            .unwrap_or(query.from.id);
        return Some(IncomingEvent {
            chat: ChatId(chat),
            user: identity(&query.from),
            kind: EventKind::Selection {
                callback_id: query.id,
                data: query.data.unwrap_or_default(),
                message_id: query.message.map(|message| message.message_id),
            },
        });
    }

    let message = update.message?;
    let user = identity(message.from.as_ref()?);
    let kind = match (message.text, message.document) {
        (Some(text), _) if text.trim_start().starts_with('/') => match BotCommand::parse(&text) {
            Some(command) => EventKind::Command(command),
            None => EventKind::Text(text),
        },
        (Some(text), _) => EventKind::Text(text),
        (None, Some(document)) => EventKind::Document {
            file_name: document.file_name,
        },
        (None, None) => EventKind::Unsupported,
    };

    Some(IncomingEvent {
        chat: ChatId(message.chat.id),
        user,
        kind,
    })
}

fn identity(user: &User) -> UserIdentity {
    UserIdentity {
        user_id: user.id,
        username: user.username.clone(),
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Debug, Serialize)]
struct AnswerCallback<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    show_alert: bool,
}

#[derive(Debug, Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TelegramClient {
    pub fn new(config: &BotConfig) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ChatError::Transport(err.without_url().to_string()))?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/bot{}",
                config.api_base_url.trim_end_matches('/'),
                config.token
            ),
        })
    }

    async fn call<P, R>(&self, method: &str, payload: &P) -> Result<R, ChatError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        // reqwest errors carry the URL, which embeds the bot token
        let response = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .json(payload)
            .send()
            .await
            .map_err(|err| ChatError::Transport(err.without_url().to_string()))?;
        let body: ApiResponse<R> = response
            .json()
            .await
            .map_err(|err| ChatError::Transport(err.without_url().to_string()))?;

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(ChatError::Rejected(format!(
                "{method}: {}",
                description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, ChatError> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "received updates");
        }
        Ok(updates)
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), ChatError> {
        let mut payload = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret.filter(|secret| !secret.is_empty()) {
            payload["secret_token"] = json!(secret);
        }
        let _: bool = self.call("setWebhook", &payload).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), ChatError> {
        let _: bool = self
            .call(
                "deleteWebhook",
                &json!({ "drop_pending_updates": drop_pending_updates }),
            )
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatGateway for TelegramClient {
    async fn send_message(
        &self,
        chat: ChatId,
        message: &OutgoingMessage,
    ) -> Result<(), ChatError> {
        let payload = SendMessage {
            chat_id: chat.0,
            text: &message.text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_markup: message.keyboard.as_ref(),
        };
        let _: serde_json::Value = self.call("sendMessage", &payload).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), ChatError> {
        let payload = AnswerCallback {
            callback_query_id: callback_id,
            text,
            show_alert,
        };
        let _: bool = self.call("answerCallbackQuery", &payload).await?;
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat: ChatId,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChatError> {
        let payload = EditMessageText {
            chat_id: chat.0,
            message_id,
            text,
            parse_mode: "HTML",
        };
        let _: serde_json::Value = self.call("editMessageText", &payload).await?;
        Ok(())
    }
}
