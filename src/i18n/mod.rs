//! Localized bot copy for the supported interface languages.
//!
//! Texts live in `locales/<lang>/*.ftl` and are compiled in with `fluent-templates`.
//! Values use literal `\n` for line breaks.

use fluent_templates::{fluent_bundle::FluentValue, static_loader, Loader};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use teloxide::utils::html;
use unic_langid::LanguageIdentifier;

pub mod admin;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "uz",
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Uz,
    Ru,
    En,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Uz => "uz",
            Language::Ru => "ru",
            Language::En => "en",
        }
    }

    pub fn id(self) -> LanguageIdentifier {
        self.code().parse().unwrap_or_default()
    }

    pub fn messages(self) -> Messages {
        Messages { lang: self.id() }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    // Accepts bare codes and region-tagged ones such as "ru-RU".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: LanguageIdentifier = s
            .parse()
            .map_err(|e| format!("invalid language tag {}: {}", s, e))?;
        match id.language.as_str() {
            "uz" => Ok(Language::Uz),
            "ru" => Ok(Language::Ru),
            "en" => Ok(Language::En),
            _ => Err(format!("unsupported language: {}", s)),
        }
    }
}

/// Maps a client-reported language code onto the configured set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePolicy {
    supported: Vec<Language>,
    default: Language,
}

impl LanguagePolicy {
    pub fn new(supported: Vec<Language>, default: Language) -> Self {
        Self { supported, default }
    }

    pub fn default_language(&self) -> Language {
        self.default
    }

    pub fn resolve(&self, code: Option<&str>) -> Language {
        code.and_then(|c| c.parse::<Language>().ok())
            .filter(|lang| self.supported.contains(lang))
            .unwrap_or(self.default)
    }

    /// Language stored on a user record; unknown values fall back to the default.
    pub fn stored(&self, code: &str) -> Language {
        self.resolve(Some(code))
    }
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self::new(vec![Language::Uz, Language::Ru, Language::En], Language::Uz)
    }
}

/// Registration fields rendered in the confirmation summary.
pub struct ProfileSummary<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub region: &'a str,
    pub district: &'a str,
    pub school: &'a str,
    pub grade: i32,
    pub phone: &'a str,
}

/// Copy lookups for one language.
#[derive(Debug, Clone)]
pub struct Messages {
    lang: LanguageIdentifier,
}

macro_rules! texts {
    ($($name:ident => $key:literal),* $(,)?) => {
        impl Messages {
            $(
                pub fn $name(&self) -> String {
                    self.text($key)
                }
            )*
        }

        #[cfg(test)]
        const TEXT_KEYS: &[&str] = &[$($key),*];
    };
}

texts! {
    welcome => "welcome",
    ask_full_name => "ask-full-name",
    invalid_full_name => "invalid-full-name",
    ask_location => "ask-location",
    invalid_location => "invalid-location",
    ask_grade => "ask-grade",
    invalid_grade => "invalid-grade",
    ask_phone => "ask-phone",
    ask_otp => "ask-otp",
    invalid_phone => "invalid-phone",
    invalid_otp => "invalid-otp",
    otp_spent => "otp-spent",
    main_menu => "main-menu",
    error => "error",
    resend_otp => "resend-otp",
    not_registered => "not-registered",
    btn_login => "btn-login",
    btn_register => "btn-register",
    btn_share_contact => "btn-share-contact",
    must_subscribe => "must-subscribe",
    btn_check_sub => "btn-check-sub",
    subscribe_success => "subscribe-success",
}

const PROFILE_LABELS: [&str; 7] = [
    "profile-first-name",
    "profile-last-name",
    "profile-region",
    "profile-district",
    "profile-school",
    "profile-grade",
    "profile-phone",
];

impl Messages {
    /// Missing keys resolve through the fallback language, then to the key itself.
    pub fn text(&self, key: &str) -> String {
        LOCALES
            .lookup(&self.lang, key)
            .unwrap_or_else(|| key.to_string())
            .replace("\\n", "\n")
    }

    pub fn text_with(&self, key: &str, args: &[(&str, String)]) -> String {
        let args: HashMap<String, FluentValue> = args
            .iter()
            .map(|(name, value)| (name.to_string(), FluentValue::from(value.clone())))
            .collect();

        LOCALES
            .lookup_with_args(&self.lang, key, &args)
            .unwrap_or_else(|| key.to_string())
            .replace("\\n", "\n")
    }

    pub fn otp_sent(&self, masked_phone: &str) -> String {
        format!(
            "{}\n\n{}",
            self.text_with("otp-sent", &[("phone", html::escape(masked_phone))]),
            self.ask_otp()
        )
    }

    /// HTML summary of a profile, fields in display order.
    pub fn profile(&self, summary: &ProfileSummary<'_>, congratulate: bool) -> String {
        let grade = summary.grade.to_string();
        let values = [
            summary.first_name,
            summary.last_name,
            summary.region,
            summary.district,
            summary.school,
            grade.as_str(),
            summary.phone,
        ];

        let lines: Vec<String> = PROFILE_LABELS
            .iter()
            .zip(values)
            .map(|(label, value)| format!("{} <b>{}</b>", self.text(label), html::escape(value)))
            .collect();

        if congratulate {
            format!("{}\n\n{}", self.text("registration-done"), lines.join("\n"))
        } else {
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_or_missing_codes_fall_back_to_default() {
        let policy = LanguagePolicy::default();
        assert_eq!(policy.resolve(None), Language::Uz);
        assert_eq!(policy.resolve(Some("de")), Language::Uz);
        assert_eq!(policy.resolve(Some("ru")), Language::Ru);
        assert_eq!(policy.resolve(Some("en-GB")), Language::En);
        assert_eq!(policy.resolve(Some("EN")), Language::En);
        assert_eq!(policy.resolve(Some("not a tag")), Language::Uz);
    }

    #[test]
    fn unsupported_languages_are_not_selected() {
        let policy = LanguagePolicy::new(vec![Language::Uz, Language::Ru], Language::Ru);
        assert_eq!(policy.resolve(Some("en")), Language::Ru);
        assert_eq!(policy.stored("uz"), Language::Uz);
    }

    #[test]
    fn every_key_is_translated_in_every_language() {
        let keys = TEXT_KEYS.iter().chain(PROFILE_LABELS.iter());
        for key in keys {
            for lang in [Language::Uz, Language::Ru, Language::En] {
                let text = lang.messages().text(key);
                assert_ne!(&text, key, "{} missing for {}", key, lang);
            }
        }
    }

    #[test]
    fn loads_known_translation_with_newlines() {
        assert_eq!(Language::Ru.messages().resend_otp(), "🔄 Отправить код повторно");
        assert_eq!(Language::En.messages().resend_otp(), "🔄 Resend code");

        let welcome = Language::Uz.messages().welcome();
        assert!(welcome.contains('\n'));
        assert!(!welcome.contains("\\n"));
    }

    #[test]
    fn otp_sent_embeds_masked_phone_without_isolation_marks() {
        let text = Language::En.messages().otp_sent("998901****67");
        assert!(text.starts_with("✅ Verification code sent: <b>998901****67</b>\n\n"));
        assert!(text.ends_with(&Language::En.messages().ask_otp()));
    }

    #[test]
    fn profile_lists_fields_in_order_and_escapes_html() {
        let summary = ProfileSummary {
            first_name: "Anvar",
            last_name: "Karimov",
            region: "Tashkent",
            district: "Yunusabad",
            school: "School <56>",
            grade: 9,
            phone: "998901234567",
        };
        let text = Language::En.messages().profile(&summary, false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "👤 First Name: <b>Anvar</b>");
        assert_eq!(lines[4], "🏫 School: <b>School &lt;56&gt;</b>");
        assert_eq!(lines[5], "🎓 Grade: <b>9</b>");
        assert_eq!(lines[6], "📱 Phone: <b>998901234567</b>");
    }
}
