use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use keyring::Entry;
use tracing::{debug, warn};

use crate::core::providers::ProviderProfile;

const KEYRING_SERVICE: &str = "murmur";

/// Failures talking to the platform credential store.
///
/// Recoverable errors mean the backend was temporarily unavailable (a locked
/// keychain, no secret service on the session bus). Permanent ones are
/// reported as-is.
#[derive(Debug)]
pub enum KeyringError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringError::Recoverable(err) | KeyringError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringError::Recoverable(err)
            }
            other => KeyringError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyring unavailable: {}", self.inner())
    }
}

impl Error for KeyringError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Where a resolved key came from, for `murmur config` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Keyring,
    Environment(String),
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Keyring => f.write_str("keyring"),
            KeySource::Environment(var) => write!(f, "${var}"),
        }
    }
}

/// API key storage, one keyring entry per provider id. Resolution tries the
/// OS keyring first, then the provider's environment variables.
#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    use_keyring: bool,
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ApiKeyStore {
    /// `use_keyring = false` keeps tests and `--no-keyring` runs away from the
    /// platform store entirely.
    pub fn new(use_keyring: bool) -> Self {
        Self { use_keyring }
    }

    pub fn uses_keyring(&self) -> bool {
        self.use_keyring
    }

    pub fn store(&self, provider: &str, key: &str) -> Result<(), KeyringError> {
        if !self.use_keyring {
            return Ok(());
        }
        let entry = Entry::new(KEYRING_SERVICE, provider)?;
        entry.set_password(key.trim())?;
        debug!(provider, "api key stored");
        Ok(())
    }

    /// Removing a key that was never stored is not an error.
    pub fn remove(&self, provider: &str) -> Result<bool, KeyringError> {
        if !self.use_keyring {
            return Ok(false);
        }
        let entry = Entry::new(KEYRING_SERVICE, provider)?;
        match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn stored_key(&self, provider: &str) -> Result<Option<String>, KeyringError> {
        if !self.use_keyring {
            return Ok(None);
        }
        let entry = Entry::new(KEYRING_SERVICE, provider)?;
        match entry.get_password() {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves the key to use for requests. A keyring failure falls through
    /// to the environment; it is only returned when no key is found at all.
    pub fn resolve(
        &self,
        provider: &ProviderProfile,
    ) -> Result<Option<(String, KeySource)>, KeyringError> {
        self.resolve_with_env(provider, |name| std::env::var(name).ok())
    }

    fn resolve_with_env<F>(
        &self,
        provider: &ProviderProfile,
        lookup: F,
    ) -> Result<Option<(String, KeySource)>, KeyringError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let keyring_result = self.stored_key(&provider.id);
        if let Ok(Some(key)) = &keyring_result {
            return Ok(Some((key.clone(), KeySource::Keyring)));
        }
        for var in &provider.env_vars {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                return Ok(Some((
                    value.trim().to_string(),
                    KeySource::Environment(var.clone()),
                )));
            }
        }
        keyring_result.map(|_| None)
    }

    /// Resolves every provider's key, skipping providers without one. A
    /// keyring failure is logged and treated as "no stored key".
    pub fn resolve_all<'a, I>(&self, providers: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a ProviderProfile>,
    {
        let mut keys = HashMap::new();
        for provider in providers {
            match self.resolve(provider) {
                Ok(Some((key, source))) => {
                    debug!(provider = %provider.id, %source, "api key resolved");
                    keys.insert(provider.id.clone(), key);
                }
                Ok(None) => {}
                Err(err) => warn!(provider = %provider.id, error = %err, "keyring unavailable"),
            }
        }
        keys
    }
}

/// Shows only the last four characters of a key.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "•".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "•".repeat(8), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai() -> ProviderProfile {
        ProviderProfile {
            id: "openai".into(),
            display_name: "OpenAI".into(),
            base_url: "https://api.openai.com/v1".into(),
            env_vars: vec!["MURMUR_API_KEY".into(), "OPENAI_API_KEY".into()],
        }
    }

    #[test]
    fn disabled_keyring_falls_back_to_environment_in_order() {
        let store = ApiKeyStore::new(false);
        let resolved = store
            .resolve_with_env(&openai(), |name| match name {
                "MURMUR_API_KEY" => Some("  murmur-key ".into()),
                "OPENAI_API_KEY" => Some("openai-key".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            resolved,
            Some((
                "murmur-key".to_string(),
                KeySource::Environment("MURMUR_API_KEY".into())
            ))
        );

        let resolved = store
            .resolve_with_env(&openai(), |name| {
                (name == "OPENAI_API_KEY").then(|| "openai-key".into())
            })
            .unwrap();
        assert_eq!(
            resolved.map(|(_, source)| source),
            Some(KeySource::Environment("OPENAI_API_KEY".into()))
        );
    }

    #[test]
    fn each_provider_reads_only_its_own_variables() {
        let store = ApiKeyStore::new(false);
        let gemini = ProviderProfile {
            id: "gemini".into(),
            display_name: "Gemini".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            env_vars: vec!["GEMINI_API_KEY".into()],
        };
        let lookup = |name: &str| (name == "OPENAI_API_KEY").then(|| "openai-key".to_string());
        assert_eq!(store.resolve_with_env(&gemini, lookup).unwrap(), None);
        assert!(store.resolve_with_env(&openai(), lookup).unwrap().is_some());
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let store = ApiKeyStore::new(false);
        let resolved = store.resolve_with_env(&openai(), |_| Some("   ".into())).unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn disabled_keyring_store_and_remove_are_no_ops() {
        let store = ApiKeyStore::new(false);
        assert!(store.store("openai", "sk-test").is_ok());
        assert!(!store.remove("openai").unwrap());
        assert_eq!(store.stored_key("openai").unwrap(), None);
    }

    #[test]
    fn keys_are_masked_to_last_four() {
        assert_eq!(mask_key("sk-abcdef123456"), "••••••••3456");
        assert_eq!(mask_key("abc"), "•••");
    }

    #[test]
    fn key_source_display() {
        assert_eq!(KeySource::Keyring.to_string(), "keyring");
        assert_eq!(
            KeySource::Environment("OPENAI_API_KEY".into()).to_string(),
            "$OPENAI_API_KEY"
        );
    }
}
