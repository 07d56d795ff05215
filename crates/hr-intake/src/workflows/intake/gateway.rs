use async_trait::async_trait;
use serde::Serialize;

use super::domain::ChatId;

/// Inline keyboard button; `callback_data` comes back verbatim when pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// One button per row.
    pub fn single_column(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self {
            inline_keyboard: buttons.into_iter().map(|button| vec![button]).collect(),
        }
    }
}

/// HTML-formatted message for the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Outbound chat operations used for user replies and reviewer notifications.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(&self, chat: ChatId, message: &OutgoingMessage)
        -> Result<(), ChatError>;

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), ChatError>;

    async fn edit_message_text(
        &self,
        chat: ChatId,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChatError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat transport unavailable: {0}")]
    Transport(String),
    #[error("chat API rejected the call: {0}")]
    Rejected(String),
}

/// The submissions tab: a header row naming writable columns, rows appended below it.
#[async_trait]
pub trait ResponseSheet: Send + Sync {
    async fn header_row(&self) -> Result<Vec<String>, SheetError>;
    async fn append_row(&self, cells: Vec<String>) -> Result<(), SheetError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("spreadsheet backend failed: {0}")]
    Backend(String),
    #[error("spreadsheet '{0}' was not found")]
    SpreadsheetNotFound(String),
    #[error("spreadsheet authorization failed: {0}")]
    Auth(String),
}
