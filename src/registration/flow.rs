use super::errors::RegistrationError;
use super::events::CallbackAction;
use super::outbound::{Button, Markup, OutboundMessage};
use super::state::State;
use super::validation::{normalize_phone, parse_full_name, parse_grade, parse_location};
use super::Registrar;
use crate::communication::error_handler::validation_hint;
use crate::database::{User, UserPatch};
use crate::i18n::{Language, ProfileSummary};
use crate::otp::mask_phone;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepInput<'a> {
    Text(&'a str),
    Contact(&'a str),
}

impl<'a> StepInput<'a> {
    fn text(self) -> Option<&'a str> {
        match self {
            StepInput::Text(text) => Some(text.trim()),
            StepInput::Contact(_) => None,
        }
    }
}

/// Replies for one step and the state the user ends up in.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub replies: Vec<OutboundMessage>,
    pub next_state: State,
}

impl StepOutcome {
    fn stay(state: State, replies: Vec<OutboundMessage>) -> Self {
        Self {
            replies,
            next_state: state,
        }
    }
}

impl Registrar {
    /// Applies one input to the user's current step.
    ///
    /// Invalid input leaves the state untouched and answers with the step's format hint.
    /// Valid input writes the collected fields together with the next state in a single update.
    pub async fn advance(
        &self,
        user: &User,
        input: StepInput<'_>,
    ) -> Result<StepOutcome, RegistrationError> {
        let lang = self.languages.stored(&user.language_code);
        let messages = lang.messages();

        if let StepInput::Contact(phone) = input {
            if user.state != State::WaitPhone {
                return Ok(StepOutcome::stay(user.state, Vec::new()));
            }
            return self.submit_phone(user, phone, lang).await;
        }
        let Some(text) = input.text() else {
            return Ok(StepOutcome::stay(user.state, Vec::new()));
        };

        match user.state {
            State::Start => {
                let user = self
                    .commit(user, UserPatch::state(State::WaitFullName))
                    .await?;
                Ok(StepOutcome::stay(user.state, self.prompt_for(user.state, lang)))
            }
            State::WaitFullName => match parse_full_name(text) {
                Ok(name) => {
                    let patch = UserPatch {
                        first_name: Some(name.first_name),
                        last_name: Some(name.last_name),
                        state: Some(State::WaitLocation),
                        ..Default::default()
                    };
                    self.commit_with_prompt(user, patch, lang).await
                }
                Err(e) => Ok(self.reprompt(user, validation_hint(&e, &messages))),
            },
            State::WaitLocation => match parse_location(text) {
                Ok(location) => {
                    let patch = UserPatch {
                        region: Some(location.region),
                        district: Some(location.district),
                        school: Some(location.school),
                        state: Some(State::WaitGrade),
                        ..Default::default()
                    };
                    self.commit_with_prompt(user, patch, lang).await
                }
                Err(e) => Ok(self.reprompt(user, validation_hint(&e, &messages))),
            },
            State::WaitGrade => match parse_grade(text) {
                Ok(grade) => {
                    let patch = UserPatch {
                        grade: Some(grade),
                        state: Some(State::WaitPhone),
                        ..Default::default()
                    };
                    self.commit_with_prompt(user, patch, lang).await
                }
                Err(e) => Ok(self.reprompt(user, validation_hint(&e, &messages))),
            },
            State::WaitPhone => self.submit_phone(user, text, lang).await,
            State::WaitOtp => self.submit_code(user, text, lang).await,
            State::Registered => Ok(StepOutcome::stay(
                State::Registered,
                vec![self.main_menu(lang)],
            )),
        }
    }

    async fn submit_phone(
        &self,
        user: &User,
        raw: &str,
        lang: Language,
    ) -> Result<StepOutcome, RegistrationError> {
        let phone = match normalize_phone(raw, &self.country_prefix) {
            Ok(phone) => phone,
            Err(e) => return Ok(self.reprompt(user, validation_hint(&e, &lang.messages()))),
        };

        self.otp.issue(user.id, &phone).await?;
        let patch = UserPatch {
            phone: Some(phone.clone()),
            state: Some(State::WaitOtp),
            ..Default::default()
        };
        let user = self.commit(user, patch).await?;

        Ok(StepOutcome::stay(
            user.state,
            vec![
                OutboundMessage::plain("✅").with_markup(Markup::RemoveKeyboard),
                self.otp_sent(&phone, lang),
            ],
        ))
    }

    async fn submit_code(
        &self,
        user: &User,
        code: &str,
        lang: Language,
    ) -> Result<StepOutcome, RegistrationError> {
        let phone = user.phone().ok_or(RegistrationError::MissingPhone)?;
        let messages = lang.messages();

        if !self.otp.verify(phone, code).await? {
            let reply = OutboundMessage::html(messages.invalid_otp())
                .with_markup(resend_keyboard(lang));
            return Ok(StepOutcome::stay(user.state, vec![reply]));
        }

        let patch = UserPatch {
            is_verified: Some(true),
            state: Some(State::Registered),
            ..Default::default()
        };
        // The code is already spent; a failed write leaves the user needing a new one.
        let user = self.commit(user, patch).await.map_err(|e| match e {
            RegistrationError::Persistence(db) => RegistrationError::CodeSpent(db),
            other => other,
        })?;
        info!(telegram_id = user.telegram_id, "User registered");

        Ok(StepOutcome::stay(
            user.state,
            vec![
                OutboundMessage::html(messages.profile(&profile_summary(&user), true)),
                self.main_menu(lang),
            ],
        ))
    }

    async fn commit_with_prompt(
        &self,
        user: &User,
        patch: UserPatch,
        lang: Language,
    ) -> Result<StepOutcome, RegistrationError> {
        let user = self.commit(user, patch).await?;
        Ok(StepOutcome::stay(user.state, self.prompt_for(user.state, lang)))
    }

    /// Writes the patch if its state is the single legal successor of the current one.
    pub(super) async fn commit(&self, user: &User, patch: UserPatch) -> Result<User, RegistrationError> {
        if let Some(next) = patch.state {
            if !user.state.can_transition_to(next) {
                return Err(RegistrationError::Transition {
                    from: user.state,
                    to: next,
                });
            }
        }
        Ok(self.stores.users.update(user.telegram_id, patch).await?)
    }

    fn reprompt(&self, user: &User, hint: String) -> StepOutcome {
        let mut reply = OutboundMessage::html(hint);
        if user.state == State::WaitPhone {
            let lang = self.languages.stored(&user.language_code);
            reply = reply.with_markup(Markup::RequestContact(
                lang.messages().btn_share_contact(),
            ));
        }
        StepOutcome::stay(user.state, vec![reply])
    }

    pub(super) fn prompt_for(&self, state: State, lang: Language) -> Vec<OutboundMessage> {
        let messages = lang.messages();
        let reply = match state {
            State::Start | State::WaitFullName => OutboundMessage::html(format!(
                "{}\n\n{}",
                messages.welcome(),
                messages.ask_full_name()
            )),
            State::WaitLocation => OutboundMessage::html(messages.ask_location()),
            State::WaitGrade => OutboundMessage::html(messages.ask_grade()),
            State::WaitPhone => OutboundMessage::html(messages.ask_phone()).with_markup(
                Markup::RequestContact(messages.btn_share_contact()),
            ),
            State::WaitOtp => {
                OutboundMessage::html(messages.ask_otp()).with_markup(resend_keyboard(lang))
            }
            State::Registered => self.main_menu(lang),
        };
        vec![reply]
    }

    pub(super) fn main_menu(&self, lang: Language) -> OutboundMessage {
        let messages = lang.messages();
        OutboundMessage::html(messages.main_menu())
            .with_markup(Markup::Inline(vec![
                vec![Button::url(messages.btn_login(), &self.links.login_url)],
                vec![Button::url(messages.btn_register(), &self.links.register_url)],
            ]))
            .without_link_preview()
    }

    pub(super) fn otp_sent(&self, phone: &str, lang: Language) -> OutboundMessage {
        OutboundMessage::html(lang.messages().otp_sent(&mask_phone(phone)))
            .with_markup(resend_keyboard(lang))
    }

    /// Issues a new code for a user waiting on one. Anyone else is ignored.
    pub(super) async fn resend_code(&self, user_id: i64, chat_id: i64) -> Result<(), RegistrationError> {
        let Some(user) = self.stores.users.find_by_telegram_id(user_id).await? else {
            return Ok(());
        };
        let Some(phone) = user.phone().filter(|_| user.state == State::WaitOtp) else {
            return Ok(());
        };

        self.otp.issue(user.id, phone).await?;
        let lang = self.languages.stored(&user.language_code);
        self.send(chat_id, self.otp_sent(phone, lang)).await
    }
}

fn resend_keyboard(lang: Language) -> Markup {
    Markup::Inline(vec![vec![Button::callback(
        lang.messages().resend_otp(),
        CallbackAction::ResendOtp,
    )]])
}

pub(super) fn profile_summary(user: &User) -> ProfileSummary<'_> {
    ProfileSummary {
        first_name: user.first_name.as_deref().unwrap_or_default(),
        last_name: user.last_name.as_deref().unwrap_or_default(),
        region: user.region.as_deref().unwrap_or_default(),
        district: user.district.as_deref().unwrap_or_default(),
        school: user.school.as_deref().unwrap_or_default(),
        grade: user.grade.unwrap_or_default(),
        phone: user.phone.as_deref().unwrap_or_default(),
    }
}
