//! In-process doubles for the external gateways.

use crate::registration::outbound::{ChatError, ChatGateway, MembershipStatus, OutboundMessage};
use crate::sms::{SmsError, SmsGateway};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeSms {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl FakeSms {
    pub fn failing() -> Self {
        let sms = Self::default();
        sms.set_failing(true);
        sms
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// First run of digits in the most recent message.
    pub fn last_code(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, text) = sent.last()?;
        let code: String = text
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        Some(code)
    }
}

#[async_trait]
impl SmsGateway for FakeSms {
    async fn send(&self, phone: &str, text: &str) -> Result<String, SmsError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SmsError::Unavailable("fake outage".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((phone.to_string(), text.to_string()));
        Ok(format!("OTP_fake_{}", sent.len()))
    }
}

#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<(i64, OutboundMessage)>>,
    memberships: Mutex<HashMap<(String, i64), MembershipStatus>>,
    failing_channels: Mutex<HashSet<String>>,
}

impl RecordingChat {
    pub fn set_membership(&self, channel: &str, user_id: i64, status: MembershipStatus) {
        self.memberships
            .lock()
            .unwrap()
            .insert((channel.to_string(), user_id), status);
    }

    pub fn fail_membership(&self, channel: &str) {
        self.failing_channels
            .lock()
            .unwrap()
            .insert(channel.to_string());
    }

    pub fn messages_to(&self, chat_id: i64) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.messages_to(chat_id)
            .into_iter()
            .map(|message| message.text)
            .collect()
    }

    pub fn last_to(&self, chat_id: i64) -> Option<OutboundMessage> {
        self.messages_to(chat_id).pop()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChatGateway for RecordingChat {
    async fn send(&self, chat_id: i64, message: OutboundMessage) -> Result<(), ChatError> {
        self.sent.lock().unwrap().push((chat_id, message));
        Ok(())
    }

    async fn membership(
        &self,
        channel_username: &str,
        user_id: i64,
    ) -> Result<MembershipStatus, ChatError> {
        if self.failing_channels.lock().unwrap().contains(channel_username) {
            return Err(ChatError::Request("member lookup failed".to_string()));
        }
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .get(&(channel_username.to_string(), user_id))
            .copied()
            .unwrap_or(MembershipStatus::Left))
    }
}
