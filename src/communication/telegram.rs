use crate::configuration::{env_secret, Context};
use crate::core::service_manager::{Error as ServiceManagerError, ServiceWithErrorSender};
use crate::registration::{
    AdminStates, Button, CallbackAction, ChatError, ChatGateway, Command, EventKind,
    InboundEvent, Markup, MembershipStatus, OutboundMessage, Registrar, Sender, TextFormat,
};
use crate::sms::etc_uz::{EtcSmsGateway, SmsCredentials};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
    KeyboardMarkup, KeyboardRemove, ParseMode, Recipient, ReplyMarkup, UserId,
};
use teloxide::utils::command::BotCommands;
use teloxide::RequestError;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct TelegramService {
    bot: Bot,
    registrar: Arc<Registrar>,
}

#[async_trait]
impl ServiceWithErrorSender for TelegramService {
    type Context = Context;

    async fn new(
        context: Context,
        error_sender: mpsc::Sender<String>,
    ) -> Result<Self, ServiceManagerError> {
        let bot = Bot::new(env_secret("TELOXIDE_TOKEN").map_err(ServiceManagerError::from)?);
        let credentials = SmsCredentials {
            login: env_secret("SMS_LOGIN").map_err(ServiceManagerError::from)?,
            password: env_secret("SMS_PASSWORD").map_err(ServiceManagerError::from)?,
        };
        let sms = EtcSmsGateway::new(&context.config.sms, credentials)
            .map_err(ServiceManagerError::from)?;

        let registrar = Registrar::new(
            &context,
            Arc::new(TelegramChat::new(bot.clone())),
            Arc::new(sms),
            Arc::new(AdminStates::default()),
        )
        .with_alerts(error_sender);

        Ok(Self {
            bot,
            registrar: Arc::new(registrar),
        })
    }

    async fn run(self) -> Result<(), ServiceManagerError> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(ServiceManagerError::from)?;
        let bot_name = me.username().to_string();
        info!(bot = %bot_name, "Telegram bot started");

        self.bot
            .set_my_commands(Command::bot_commands())
            .await
            .map_err(ServiceManagerError::from)?;

        Dispatcher::builder(self.bot, schema(self.registrar, Arc::new(bot_name)))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
        Ok(())
    }
}

fn schema(registrar: Arc<Registrar>, bot_name: Arc<String>) -> UpdateHandler<RequestError> {
    let on_message = {
        let registrar = registrar.clone();
        move |msg: Message| {
            let registrar = registrar.clone();
            let bot_name = bot_name.clone();
            async move {
                if let Some(event) = message_to_event(&msg, &bot_name) {
                    registrar.spawn_handle(event).await;
                }
                respond(())
            }
        }
    };

    let on_callback = move |bot: Bot, q: CallbackQuery| {
        let registrar = registrar.clone();
        async move {
            if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
                warn!(error = %e, "Failed to answer callback query");
            }
            if let Some(event) = callback_to_event(&q) {
                registrar.spawn_handle(event).await;
            }
            respond(())
        }
    };

    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback))
}

fn sender(user: &teloxide::types::User) -> Sender {
    Sender {
        user_id: user.id.0 as i64,
        username: user.username.clone(),
        language_code: user.language_code.clone(),
    }
}

/// Unknown commands and non-text media produce no event.
pub fn message_to_event(msg: &Message, bot_name: &str) -> Option<InboundEvent> {
    let from = sender(msg.from()?);
    let kind = if let Some(contact) = msg.contact() {
        EventKind::Contact {
            phone: contact.phone_number.clone(),
        }
    } else {
        let text = msg.text()?;
        if text.starts_with('/') {
            EventKind::Command(Command::parse(text, bot_name).ok()?)
        } else {
            EventKind::Text(text.to_string())
        }
    };

    Some(InboundEvent {
        from,
        chat_id: msg.chat.id.0,
        kind,
    })
}

pub fn callback_to_event(q: &CallbackQuery) -> Option<InboundEvent> {
    let chat_id = q.message.as_ref()?.chat.id.0;
    let action = CallbackAction::parse(q.data.as_deref()?)?;
    Some(InboundEvent {
        from: sender(&q.from),
        chat_id,
        kind: EventKind::Callback(action),
    })
}

pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatGateway for TelegramChat {
    async fn send(&self, chat_id: i64, message: OutboundMessage) -> Result<(), ChatError> {
        let mut request = self.bot.send_message(ChatId(chat_id), message.text);
        if message.format == TextFormat::Html {
            request = request.parse_mode(ParseMode::Html);
        }
        if !message.link_preview {
            request = request.disable_web_page_preview(true);
        }
        if let Some(markup) = message.markup {
            request = request.reply_markup(reply_markup(markup)?);
        }

        request
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;
        Ok(())
    }

    async fn membership(
        &self,
        channel_username: &str,
        user_id: i64,
    ) -> Result<MembershipStatus, ChatError> {
        let member = self
            .bot
            .get_chat_member(
                Recipient::ChannelUsername(format!("@{}", channel_username)),
                UserId(user_id as u64),
            )
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;

        Ok(match member.kind {
            ChatMemberKind::Left => MembershipStatus::Left,
            ChatMemberKind::Banned(_) => MembershipStatus::Kicked,
            _ => MembershipStatus::Member,
        })
    }
}

fn reply_markup(markup: Markup) -> Result<ReplyMarkup, ChatError> {
    Ok(match markup {
        Markup::Inline(rows) => {
            let rows = rows
                .into_iter()
                .map(|row| row.into_iter().map(inline_button).collect())
                .collect::<Result<Vec<Vec<_>>, _>>()?;
            ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(rows))
        }
        Markup::RequestContact(label) => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![vec![
                KeyboardButton::new(label).request(ButtonRequest::Contact)
            ]])
            .resize_keyboard(true)
            .one_time_keyboard(true),
        ),
        Markup::RemoveKeyboard => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    })
}

fn inline_button(button: Button) -> Result<InlineKeyboardButton, ChatError> {
    Ok(match button {
        Button::Callback { label, action } => InlineKeyboardButton::callback(label, action.token()),
        Button::Url { label, url } => {
            let url = reqwest::Url::parse(&url).map_err(|e| ChatError::Markup(e.to_string()))?;
            InlineKeyboardButton::url(label, url)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_rows_keep_layout() {
        let markup = reply_markup(Markup::Inline(vec![
            vec![Button::url("Login", "https://khiso.uz/login")],
            vec![
                Button::callback("Stats", CallbackAction::AdminStats),
                Button::callback("Delete", CallbackAction::DeleteChannel(3)),
            ],
        ]))
        .unwrap();

        let ReplyMarkup::InlineKeyboard(keyboard) = markup else {
            panic!("expected inline keyboard");
        };
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[1].len(), 2);
        assert_eq!(keyboard.inline_keyboard[1][1].text, "Delete");
    }

    #[test]
    fn invalid_url_is_a_markup_error() {
        let result = reply_markup(Markup::Inline(vec![vec![Button::url("x", "not a url")]]));
        assert!(matches!(result, Err(ChatError::Markup(_))));
    }
}
