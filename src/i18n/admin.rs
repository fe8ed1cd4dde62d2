// Admin panel copy. Admins are operators, so this is Uzbek only.

use super::{Language, Messages};
use crate::database::Stats;

fn uz() -> Messages {
    Language::Uz.messages()
}

pub fn text(key: &str) -> String {
    uz().text(&format!("admin-{}", key))
}

pub fn panel(stats: &Stats) -> String {
    uz().text_with(
        "admin-panel",
        &[
            ("total", stats.total_users.to_string()),
            ("verified", stats.verified_users.to_string()),
            ("today", stats.today_users.to_string()),
            ("channels", stats.active_channels.to_string()),
        ],
    )
}

pub fn channel_added(username: &str) -> String {
    uz().text_with("admin-channel-added", &[("username", username.to_string())])
}

pub fn channel_add_failed(reason: &str) -> String {
    uz().text_with("admin-channel-add-failed", &[("reason", reason.to_string())])
}

pub fn broadcast_done(delivered: usize, failed: usize) -> String {
    uz().text_with(
        "admin-broadcast-done",
        &[
            ("delivered", delivered.to_string()),
            ("failed", failed.to_string()),
        ],
    )
}

pub fn delete_button(username: &str) -> String {
    uz().text_with("admin-delete-button", &[("username", username.to_string())])
}
