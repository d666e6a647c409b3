use anyhow::{Context, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

use crate::config::DEFAULT_LOCALES_DIR;

pub const FALLBACK_LANGUAGE: &str = "en";
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "ar"];

/// Localization manager for the bot's user-facing messages
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a localization manager reading `./locales`
    pub fn new() -> Result<Self> {
        Self::from_dir(DEFAULT_LOCALES_DIR)
    }

    /// Create a localization manager reading `<dir>/<lang>/main.ftl`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut bundles = HashMap::new();

        for lang in SUPPORTED_LANGUAGES {
            let locale: LanguageIdentifier = lang
                .parse()
                .with_context(|| format!("Invalid language identifier: {lang}"))?;
            let bundle = Self::create_bundle(dir.as_ref(), &locale)?;
            bundles.insert(lang.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(dir: &Path, locale: &LanguageIdentifier) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Keep placeables free of Unicode isolation marks in chat messages
        bundle.set_use_isolating(false);

        let resource_path = dir.join(locale.to_string()).join("main.ftl");
        match fs::read_to_string(&resource_path) {
            Ok(content) => {
                let resource = FluentResource::try_new(content).map_err(|(_, errors)| {
                    anyhow::anyhow!("Failed to parse {}: {:?}", resource_path.display(), errors)
                })?;
                bundle.add_resource(resource).map_err(|errors| {
                    anyhow::anyhow!("Duplicate messages in {}: {:?}", resource_path.display(), errors)
                })?;
                debug!(path = %resource_path.display(), "Loaded locale resource");
            }
            Err(e) => {
                warn!(path = %resource_path.display(), error = %e, "Locale resource not found");
            }
        }

        Ok(bundle)
    }

    /// Map a Telegram language code (`en-US`, `ar`) to a supported language
    pub fn resolve_language(&self, language_code: Option<&str>) -> &str {
        let primary = language_code
            .and_then(|code| code.split(['-', '_']).next())
            .map(|code| code.to_ascii_lowercase());

        match primary {
            Some(code) => SUPPORTED_LANGUAGES
                .iter()
                .copied()
                .find(|lang| *lang == code)
                .unwrap_or(FALLBACK_LANGUAGE),
            None => FALLBACK_LANGUAGE,
        }
    }

    /// Get a localized message in a language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let candidates = [language, FALLBACK_LANGUAGE];
        for lang in candidates {
            let Some(bundle) = self.bundles.get(lang) else {
                continue;
            };
            let Some(msg) = bundle.get_message(key) else {
                continue;
            };
            let Some(pattern) = msg.value() else {
                return format!("Missing value for key: {key}");
            };

            let fluent_args = args.map(|args| {
                let mut fluent_args = FluentArgs::new();
                for (k, v) in args {
                    fluent_args.set(*k, FluentValue::from(*v));
                }
                fluent_args
            });

            let mut errors = vec![];
            let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
            if !errors.is_empty() {
                debug!(key, ?errors, "Message formatted with errors");
            }
            return value.into_owned();
        }

        format!("Missing translation: {key}")
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(&self, key: &str, language: &str, args: &[(&str, &str)]) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, language, Some(&args_map))
    }
}

/// Global localization instance
static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager from `dir`
pub fn init_localization(dir: impl AsRef<Path>) -> Result<()> {
    let manager = LocalizationManager::from_dir(dir)?;
    if LOCALIZATION_MANAGER.set(manager).is_err() {
        debug!("Localization manager already initialized");
    }
    Ok(())
}

/// Get the global localization manager, loading `./locales` on first use
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to an empty localization manager");
            LocalizationManager {
                bundles: HashMap::new(),
            }
        })
    })
}

/// Convenience function to get a localized message for a user's language
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    let manager = get_localization_manager();
    let lang = manager.resolve_language(language_code);
    manager.get_message_in_language(key, lang, None)
}

/// Convenience function to get a localized message with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let manager = get_localization_manager();
    let lang = manager.resolve_language(language_code);
    manager.get_message_with_args(key, lang, args)
}
