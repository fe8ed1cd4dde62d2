use async_trait::async_trait;
use thiserror::Error;

use super::events::CallbackAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Callback { label: String, action: CallbackAction },
    Url { label: String, url: String },
}

impl Button {
    pub fn callback(label: impl Into<String>, action: CallbackAction) -> Self {
        Button::Callback {
            label: label.into(),
            action,
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url {
            label: label.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Inline(Vec<Vec<Button>>),
    /// One-time reply keyboard with a single share-contact button.
    RequestContact(String),
    RemoveKeyboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub format: TextFormat,
    pub markup: Option<Markup>,
    pub link_preview: bool,
}

impl OutboundMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Plain,
            markup: None,
            link_preview: true,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            format: TextFormat::Html,
            ..Self::plain(text)
        }
    }

    pub fn with_markup(mut self, markup: Markup) -> Self {
        self.markup = Some(markup);
        self
    }

    pub fn without_link_preview(mut self) -> Self {
        self.link_preview = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Member,
    Left,
    Kicked,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Telegram request failed: {0}")]
    Request(String),
    #[error("Invalid markup: {0}")]
    Markup(String),
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send(&self, chat_id: i64, message: OutboundMessage) -> Result<(), ChatError>;
    async fn membership(
        &self,
        channel_username: &str,
        user_id: i64,
    ) -> Result<MembershipStatus, ChatError>;
}
