use super::events::CallbackAction;
use super::outbound::{Button, ChatGateway, Markup, MembershipStatus, OutboundMessage};
use crate::database::{Channel, ChannelStore};
use crate::i18n::Messages;
use std::sync::Arc;
use tracing::{debug, warn};

/// Blocks users who have not joined every active channel.
pub struct SubscriptionGate {
    channels: Arc<dyn ChannelStore>,
    chat: Arc<dyn ChatGateway>,
}

impl SubscriptionGate {
    pub fn new(channels: Arc<dyn ChannelStore>, chat: Arc<dyn ChatGateway>) -> Self {
        Self { channels, chat }
    }

    /// Active channels the user is not a member of. A failing channel store lets everyone through.
    pub async fn missing_channels(&self, user_id: i64) -> Vec<Channel> {
        let channels = match self.channels.list_active().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(user_id, error = %e, "Channel lookup failed, skipping subscription check");
                return Vec::new();
            }
        };

        let mut missing = Vec::new();
        for channel in channels {
            match self.chat.membership(&channel.channel_username, user_id).await {
                Ok(MembershipStatus::Member) => {}
                Ok(status) => {
                    debug!(user_id, channel = %channel.channel_username, ?status, "Not subscribed");
                    missing.push(channel);
                }
                Err(e) => {
                    debug!(user_id, channel = %channel.channel_username, error = %e, "Membership check failed");
                    missing.push(channel);
                }
            }
        }
        missing
    }

    pub fn prompt(missing: &[Channel], messages: &Messages) -> OutboundMessage {
        let mut rows: Vec<Vec<Button>> = missing
            .iter()
            .map(|channel| {
                vec![Button::url(
                    format!("📢 {}", channel.channel_username),
                    channel.join_url(),
                )]
            })
            .collect();
        rows.push(vec![Button::callback(
            messages.btn_check_sub(),
            CallbackAction::CheckSubscription,
        )]);

        OutboundMessage::html(messages.must_subscribe()).with_markup(Markup::Inline(rows))
    }
}
