// SPDX-License-Identifier: GPL-3.0-only

//! Localization for the capture screen
//!
//! Only the strings the session itself produces live here (`i18n/<lang>/facecam.ftl`).
//! Everything else on the screen belongs to the host.

use crate::backends::camera::types::ErrorKind;
use i18n_embed::{
    DefaultLocalizer, LanguageLoader, Localizer,
    fluent::{FluentLanguageLoader, fluent_language_loader},
    unic_langid::LanguageIdentifier,
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{error, warn};

/// Applies the requested language(s) to requested translations from the `fl!()` macro.
pub fn init(requested_languages: &[LanguageIdentifier]) {
    if let Err(why) = localizer().select(requested_languages) {
        warn!(error = %why, "Error while loading fluent localizations");
    }
}

/// Get the `Localizer` to be used for localizing this library.
#[must_use]
pub fn localizer() -> Box<dyn Localizer> {
    Box::from(DefaultLocalizer::new(&*LANGUAGE_LOADER, &Localizations))
}

#[derive(RustEmbed)]
#[folder = "i18n/"]
struct Localizations;

pub static LANGUAGE_LOADER: LazyLock<FluentLanguageLoader> = LazyLock::new(|| {
    let loader: FluentLanguageLoader = fluent_language_loader!();

    if let Err(e) = loader.load_fallback_language(&Localizations) {
        error!(error = %e, "Error while loading fallback language");
    }

    loader
});

/// Request a localized string by ID from the i18n/ directory.
#[macro_export]
macro_rules! fl {
    ($message_id:literal) => {{
        i18n_embed_fl::fl!($crate::i18n::LANGUAGE_LOADER, $message_id)
    }};

    ($message_id:literal, $($args:expr),*) => {{
        i18n_embed_fl::fl!($crate::i18n::LANGUAGE_LOADER, $message_id, $($args), *)
    }};
}

/// Message shown on the error panel for a failure classification
pub fn error_message(kind: ErrorKind) -> String {
    match kind {
        ErrorKind::Unsupported => crate::fl!("error-unsupported"),
        ErrorKind::PermissionDenied => crate::fl!("error-permission-denied"),
        ErrorKind::NotFound => crate::fl!("error-not-found"),
        ErrorKind::Busy => crate::fl!("error-busy"),
        ErrorKind::Other => crate::fl!("error-other"),
    }
}

/// Language pinned by the user, overriding the desktop's preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
}

impl Locale {
    /// Pick a locale from a language tag such as `es`, `es-MX` or `es_MX.UTF-8`
    pub fn from_tag(tag: &str) -> Option<Self> {
        let lang = tag
            .split(['_', '-', '.', '@'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match lang.as_str() {
            "en" => Some(Locale::English),
            "es" => Some(Locale::Spanish),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Spanish => "es",
        }
    }

    /// Identifier handed to [`init`]
    pub fn language_id(&self) -> LanguageIdentifier {
        self.tag().parse().unwrap_or_default()
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}
