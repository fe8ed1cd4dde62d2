//! Conversational registration: one entry point per inbound event.

pub mod admin;
pub mod errors;
pub mod events;
mod flow;
pub mod outbound;
pub mod state;
pub mod subscription;
pub mod validation;

pub use admin::{AdminIntent, AdminStates};
pub use errors::{RegistrationError, ValidationError};
pub use events::{CallbackAction, Command, EventKind, InboundEvent, Sender};
pub use flow::{StepInput, StepOutcome};
pub use outbound::{
    Button, ChatError, ChatGateway, Markup, MembershipStatus, OutboundMessage, TextFormat,
};
pub use state::State;

use crate::communication::error_handler;
use crate::configuration::Context;
use crate::core::user_locks::UserLocks;
use crate::database::{DatabaseError, NewUser, Stores, User, UserPatch};
use crate::i18n::{Language, LanguagePolicy};
use crate::otp::{OtpService, OtpSettings};
use crate::sms::SmsGateway;
use std::sync::Arc;
use subscription::SubscriptionGate;
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct MenuLinks {
    pub login_url: String,
    pub register_url: String,
}

pub struct Registrar {
    stores: Stores,
    otp: OtpService,
    chat: Arc<dyn ChatGateway>,
    gate: SubscriptionGate,
    admin_states: Arc<AdminStates>,
    locks: UserLocks,
    languages: LanguagePolicy,
    country_prefix: String,
    links: MenuLinks,
    alerts: Option<mpsc::Sender<String>>,
}

impl Registrar {
    pub fn new(
        context: &Context,
        chat: Arc<dyn ChatGateway>,
        sms: Arc<dyn SmsGateway>,
        admin_states: Arc<AdminStates>,
    ) -> Self {
        let config = &context.config;
        let stores = context.stores.clone();

        Self {
            otp: OtpService::new(stores.otp.clone(), sms, OtpSettings::from(&config.otp)),
            gate: SubscriptionGate::new(stores.channels.clone(), chat.clone()),
            stores,
            chat,
            admin_states,
            locks: UserLocks::default(),
            languages: config.language_policy(),
            country_prefix: config.phone.country_prefix.clone(),
            links: MenuLinks {
                login_url: config.telegram.login_url.clone(),
                register_url: config.telegram.register_url.clone(),
            },
            alerts: None,
        }
    }

    /// System errors are additionally forwarded to this channel.
    pub fn with_alerts(mut self, alerts: mpsc::Sender<String>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Handles one event. Events of the same user never run concurrently.
    pub async fn handle(&self, event: InboundEvent) {
        let guard = self.locks.acquire(event.from.user_id).await;
        self.process(event, guard).await;
    }

    /// Runs the event on its own task once the user's turn is reserved.
    ///
    /// The turn is taken before spawning, so a user's events are handled in the
    /// order this method is called.
    pub async fn spawn_handle(self: &Arc<Self>, event: InboundEvent) -> JoinHandle<()> {
        let guard = self.locks.acquire(event.from.user_id).await;
        let registrar = Arc::clone(self);
        tokio::spawn(async move { registrar.process(event, guard).await })
    }

    async fn process(&self, event: InboundEvent, _turn: OwnedMutexGuard<()>) {
        if let Err(e) = self.dispatch(&event).await {
            self.report(&event, e).await;
        }
    }

    async fn dispatch(&self, event: &InboundEvent) -> Result<(), RegistrationError> {
        match &event.kind {
            EventKind::Command(Command::Start) => self.start(event).await,
            EventKind::Command(Command::Resend) => {
                self.resend_code(event.from.user_id, event.chat_id).await
            }
            EventKind::Command(Command::Profile) => self.profile(event).await,
            EventKind::Command(Command::Admin) => self.open_admin_panel(event).await,
            EventKind::Text(text) => self.on_text(event, text).await,
            EventKind::Contact { phone } => self.on_input(event, StepInput::Contact(phone)).await,
            EventKind::Callback(action) => self.on_callback(event, *action).await,
        }
    }

    async fn on_text(&self, event: &InboundEvent, text: &str) -> Result<(), RegistrationError> {
        if let Some(intent) = self.admin_states.take(event.from.user_id).await {
            debug!(user_id = event.from.user_id, ?intent, "Admin intent consumed message");
            return self.complete_admin_intent(event, intent, text).await;
        }
        if text.trim().is_empty() {
            return Ok(());
        }
        self.on_input(event, StepInput::Text(text)).await
    }

    async fn on_input(
        &self,
        event: &InboundEvent,
        input: StepInput<'_>,
    ) -> Result<(), RegistrationError> {
        let Some(user) = self
            .stores
            .users
            .find_by_telegram_id(event.from.user_id)
            .await?
        else {
            return self.start(event).await;
        };

        let outcome = self.advance(&user, input).await?;
        if outcome.next_state != user.state {
            debug!(
                telegram_id = user.telegram_id,
                from = %user.state,
                to = %outcome.next_state,
                "State advanced"
            );
        }
        self.send_all(event.chat_id, outcome.replies).await
    }

    async fn on_callback(
        &self,
        event: &InboundEvent,
        action: CallbackAction,
    ) -> Result<(), RegistrationError> {
        if action.requires_admin() {
            return self.on_admin_callback(event, action).await;
        }

        match action {
            CallbackAction::CheckSubscription => {
                let lang = self.language_for(event).await?;
                if !self.passes_gate(event, lang).await? {
                    return Ok(());
                }
                self.send(
                    event.chat_id,
                    OutboundMessage::html(lang.messages().subscribe_success()),
                )
                .await?;
                self.enter_flow(event).await
            }
            CallbackAction::ResendOtp => self.resend_code(event.from.user_id, event.chat_id).await,
            _ => Ok(()),
        }
    }

    async fn start(&self, event: &InboundEvent) -> Result<(), RegistrationError> {
        let lang = self.language_for(event).await?;
        if !self.passes_gate(event, lang).await? {
            return Ok(());
        }
        self.enter_flow(event).await
    }

    /// Creates the user on first contact, otherwise resumes where they left off.
    async fn enter_flow(&self, event: &InboundEvent) -> Result<(), RegistrationError> {
        let mut user = self.get_or_create(event).await?;
        let lang = self.languages.stored(&user.language_code);

        if user.is_registered() {
            return self.send(event.chat_id, self.main_menu(lang)).await;
        }
        if user.state == State::Start {
            user = self
                .commit(&user, UserPatch::state(State::WaitFullName))
                .await?;
        }
        self.send_all(event.chat_id, self.prompt_for(user.state, lang)).await
    }

    async fn get_or_create(&self, event: &InboundEvent) -> Result<User, RegistrationError> {
        let users = &self.stores.users;
        if let Some(user) = users.find_by_telegram_id(event.from.user_id).await? {
            debug!(telegram_id = user.telegram_id, state = %user.state, "Existing user found");
            return Ok(user);
        }

        let language = self
            .languages
            .resolve(event.from.language_code.as_deref());
        let new_user = NewUser {
            telegram_id: event.from.user_id,
            username: event.from.username.clone(),
            language_code: language.code().to_string(),
            state: State::WaitFullName,
        };

        match users.create(new_user).await {
            Ok(user) => Ok(user),
            Err(DatabaseError::Duplicate(_)) => users
                .find_by_telegram_id(event.from.user_id)
                .await?
                .ok_or(RegistrationError::Persistence(DatabaseError::UserNotFound)),
            Err(e) => Err(e.into()),
        }
    }

    async fn profile(&self, event: &InboundEvent) -> Result<(), RegistrationError> {
        let user = self
            .stores
            .users
            .find_by_telegram_id(event.from.user_id)
            .await?;

        let message = match user {
            Some(user) if user.is_verified => {
                let messages = self.languages.stored(&user.language_code).messages();
                OutboundMessage::html(messages.profile(&flow::profile_summary(&user), false))
            }
            Some(user) => OutboundMessage::plain(
                self.languages.stored(&user.language_code).messages().not_registered(),
            ),
            None => OutboundMessage::plain(self.event_language(event).messages().not_registered()),
        };
        self.send(event.chat_id, message).await
    }

    async fn passes_gate(&self, event: &InboundEvent, lang: Language) -> Result<bool, RegistrationError> {
        let missing = self.gate.missing_channels(event.from.user_id).await;
        if missing.is_empty() {
            return Ok(true);
        }

        info!(user_id = event.from.user_id, missing = missing.len(), "Subscription required");
        self.send(
            event.chat_id,
            SubscriptionGate::prompt(&missing, &lang.messages()),
        )
        .await?;
        Ok(false)
    }

    /// Stored language for known users, client language otherwise.
    async fn language_for(&self, event: &InboundEvent) -> Result<Language, RegistrationError> {
        let user = self
            .stores
            .users
            .find_by_telegram_id(event.from.user_id)
            .await?;
        Ok(match user {
            Some(user) => self.languages.stored(&user.language_code),
            None => self.event_language(event),
        })
    }

    fn event_language(&self, event: &InboundEvent) -> Language {
        self.languages.resolve(event.from.language_code.as_deref())
    }

    async fn send(&self, chat_id: i64, message: OutboundMessage) -> Result<(), RegistrationError> {
        Ok(self.chat.send(chat_id, message).await?)
    }

    async fn send_all(
        &self,
        chat_id: i64,
        messages: Vec<OutboundMessage>,
    ) -> Result<(), RegistrationError> {
        for message in messages {
            self.send(chat_id, message).await?;
        }
        Ok(())
    }

    async fn report(&self, event: &InboundEvent, e: RegistrationError) {
        if e.is_system() {
            error!(user_id = event.from.user_id, error = %e, "Failed to handle event");
            if let Some(alerts) = &self.alerts {
                let _ = alerts.send(error_handler::alert_text(event, &e)).await;
            }
        }
        if matches!(e, RegistrationError::Chat(_)) {
            return;
        }

        let lang = match self.language_for(event).await {
            Ok(lang) => lang,
            Err(_) => self.event_language(event),
        };
        if let Err(send_error) = self
            .chat
            .send(event.chat_id, error_handler::user_message(&e, &lang.messages()))
            .await
        {
            error!(user_id = event.from.user_id, error = %send_error, "Failed to send error reply");
        }
    }
}
