use super::errors::RegistrationError;
use super::events::{CallbackAction, InboundEvent};
use super::outbound::{Button, Markup, OutboundMessage};
use super::Registrar;
use crate::database::{DatabaseError, NewChannel, Stats};
use crate::i18n::admin as copy;
use chrono::{NaiveTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// What the next free-text message from an admin is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminIntent {
    AwaitingChannel,
    AwaitingBroadcast,
}

/// Pending admin intents. Lives for the process only.
#[derive(Debug, Default)]
pub struct AdminStates {
    intents: RwLock<HashMap<i64, AdminIntent>>,
}

impl AdminStates {
    pub async fn set(&self, user_id: i64, intent: AdminIntent) {
        self.intents.write().await.insert(user_id, intent);
    }

    pub async fn get(&self, user_id: i64) -> Option<AdminIntent> {
        self.intents.read().await.get(&user_id).copied()
    }

    /// Removes and returns the pending intent.
    pub async fn take(&self, user_id: i64) -> Option<AdminIntent> {
        if !self.intents.read().await.contains_key(&user_id) {
            return None;
        }
        self.intents.write().await.remove(&user_id)
    }
}

/// Accepts `@name`, `name` and `t.me/name` links.
pub fn parse_channel_username(input: &str) -> Option<String> {
    let input = input.trim();
    let name = input
        .strip_prefix("https://t.me/")
        .or_else(|| input.strip_prefix("t.me/"))
        .unwrap_or(input);
    let name = name.trim_start_matches('@').trim_end_matches('/');

    let valid = (5..=32).contains(&name.len())
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    valid.then(|| name.to_string())
}

impl Registrar {
    pub(super) async fn open_admin_panel(&self, event: &InboundEvent) -> Result<(), RegistrationError> {
        if !self.stores.admins.is_admin(event.from.user_id).await? {
            return Ok(());
        }
        self.send_admin_panel(event.chat_id).await
    }

    pub(super) async fn on_admin_callback(
        &self,
        event: &InboundEvent,
        action: CallbackAction,
    ) -> Result<(), RegistrationError> {
        let user_id = event.from.user_id;
        if !self.stores.admins.is_admin(user_id).await? {
            warn!(user_id, action = %action.token(), "Admin callback from non-admin");
            return self.send(event.chat_id, OutboundMessage::plain(copy::text("not-admin"))).await;
        }

        match action {
            CallbackAction::AdminStats | CallbackAction::AdminBack => {
                self.send_admin_panel(event.chat_id).await
            }
            CallbackAction::AdminAddChannel => {
                self.admin_states.set(user_id, AdminIntent::AwaitingChannel).await;
                self.send(event.chat_id, OutboundMessage::plain(copy::text("add-channel-prompt")))
                    .await
            }
            CallbackAction::AdminBroadcast => {
                self.admin_states.set(user_id, AdminIntent::AwaitingBroadcast).await;
                self.send(event.chat_id, OutboundMessage::plain(copy::text("broadcast-prompt")))
                    .await
            }
            CallbackAction::AdminRemoveChannel => self.send_channel_list(event.chat_id).await,
            CallbackAction::DeleteChannel(id) => {
                if self.stores.channels.delete(id).await? {
                    info!(user_id, channel_id = id, "Channel removed");
                    self.send(event.chat_id, OutboundMessage::plain(copy::text("channel-deleted")))
                        .await?;
                } else {
                    debug!(user_id, channel_id = id, "Channel already gone");
                }
                self.send_admin_panel(event.chat_id).await
            }
            CallbackAction::CheckSubscription | CallbackAction::ResendOtp => Ok(()),
        }
    }

    pub(super) async fn complete_admin_intent(
        &self,
        event: &InboundEvent,
        intent: AdminIntent,
        text: &str,
    ) -> Result<(), RegistrationError> {
        match intent {
            AdminIntent::AwaitingChannel => self.add_channel(event, text).await,
            AdminIntent::AwaitingBroadcast => self.broadcast(event, text).await,
        }
    }

    async fn add_channel(&self, event: &InboundEvent, text: &str) -> Result<(), RegistrationError> {
        let Some(username) = parse_channel_username(text) else {
            return self.send(event.chat_id, OutboundMessage::plain(copy::text("invalid-channel"))).await;
        };

        let reply = match self
            .stores
            .channels
            .create(NewChannel::from_username(&username))
            .await
        {
            Ok(channel) => {
                info!(user_id = event.from.user_id, channel = %channel.channel_username, "Channel added");
                copy::channel_added(&channel.channel_username)
            }
            Err(e @ DatabaseError::Duplicate(_)) => copy::channel_add_failed(&e.to_string()),
            Err(e) => {
                warn!(error = %e, "Channel insert failed");
                copy::channel_add_failed(&e.to_string())
            }
        };

        self.send(event.chat_id, OutboundMessage::plain(reply)).await?;
        self.send_admin_panel(event.chat_id).await
    }

    async fn broadcast(&self, event: &InboundEvent, text: &str) -> Result<(), RegistrationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let recipients = self.stores.users.list_verified().await?;
        let mut delivered = 0;
        let mut failed = 0;
        for user in &recipients {
            match self
                .chat
                .send(user.telegram_id, OutboundMessage::plain(text))
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    warn!(telegram_id = user.telegram_id, error = %e, "Broadcast delivery failed");
                }
            }
        }

        info!(user_id = event.from.user_id, delivered, failed, "Broadcast finished");
        self.send(
            event.chat_id,
            OutboundMessage::html(copy::broadcast_done(delivered, failed)),
        )
        .await
    }

    pub(super) async fn stats(&self) -> Result<Stats, RegistrationError> {
        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        let users = self.stores.users.stats(midnight).await?;
        let active_channels = self.stores.channels.list_active().await?.len();

        Ok(Stats {
            total_users: users.total,
            verified_users: users.verified,
            today_users: users.today,
            active_channels,
        })
    }

    async fn send_admin_panel(&self, chat_id: i64) -> Result<(), RegistrationError> {
        let stats = self.stats().await?;
        let keyboard = Markup::Inline(vec![
            vec![Button::callback(copy::text("btn-stats"), CallbackAction::AdminStats)],
            vec![
                Button::callback(copy::text("btn-add-channel"), CallbackAction::AdminAddChannel),
                Button::callback(copy::text("btn-remove-channel"), CallbackAction::AdminRemoveChannel),
            ],
            vec![Button::callback(copy::text("btn-broadcast"), CallbackAction::AdminBroadcast)],
        ]);
        self.send(
            chat_id,
            OutboundMessage::html(copy::panel(&stats)).with_markup(keyboard),
        )
        .await
    }

    async fn send_channel_list(&self, chat_id: i64) -> Result<(), RegistrationError> {
        let channels = self.stores.channels.list_all().await?;
        if channels.is_empty() {
            return self.send(chat_id, OutboundMessage::plain(copy::text("no-channels"))).await;
        }

        let mut rows: Vec<Vec<Button>> = channels
            .iter()
            .map(|channel| {
                vec![Button::callback(
                    copy::delete_button(&channel.channel_username),
                    CallbackAction::DeleteChannel(channel.id),
                )]
            })
            .collect();
        rows.push(vec![Button::callback(copy::text("btn-back"), CallbackAction::AdminBack)]);

        self.send(
            chat_id,
            OutboundMessage::plain(copy::text("select-channel")).with_markup(Markup::Inline(rows)),
        )
        .await
    }
}
