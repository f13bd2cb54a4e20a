//! The Google API key.
//!
//! The key lives in a [`SecretString`] from the moment it is resolved and is
//! only read back where the request header is set.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Environment variable consulted when `--api-key` is not given.
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Where the key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Flag,
    Environment,
    /// Handed in by library code or a test
    Explicit,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialSource::Flag => "--api-key",
            CredentialSource::Environment => "environment",
            CredentialSource::Explicit => "caller",
        })
    }
}

/// An API key that never shows up in logs.
pub struct ApiCredential {
    key: SecretString,
    source: CredentialSource,
}

impl ApiCredential {
    pub fn explicit(key: impl Into<String>) -> Self {
        Self::with_source(key.into(), CredentialSource::Explicit)
    }

    fn with_source(key: String, source: CredentialSource) -> Self {
        Self {
            key: SecretString::from(key),
            source,
        }
    }

    /// Take the flag value when it is non-empty, else `env_var`.
    ///
    /// An empty string counts as absent in both places, so
    /// `--api-key ""` still falls through to the environment.
    pub fn resolve(flag: Option<String>, env_var: &str) -> Result<Self, ProviderError> {
        if let Some(key) = flag.filter(|k| !k.is_empty()) {
            return Ok(Self::with_source(key, CredentialSource::Flag));
        }

        match std::env::var(env_var) {
            Ok(key) if !key.is_empty() => Ok(Self::with_source(key, CredentialSource::Environment)),
            _ => Err(ProviderError::NotConfigured(format!(
                "API key required: pass --api-key or set {env_var}"
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        self.key.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.key.expose_secret().trim().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("key", &"***")
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API key *** (from {})", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "AIzaSy-not-a-real-key";

    #[test]
    fn test_key_never_formatted() {
        let cred = ApiCredential::explicit(KEY);
        assert!(!format!("{cred:?}").contains(KEY));
        assert!(!format!("{cred}").contains(KEY));
        assert_eq!(cred.to_string(), "API key *** (from caller)");
    }

    #[test]
    fn test_flag_wins_and_empty_flag_falls_through() {
        std::env::set_var("GOVBENCH_TEST_KEY_RESOLVE", "from-env");

        let cred = ApiCredential::resolve(Some("from-flag".into()), "GOVBENCH_TEST_KEY_RESOLVE").unwrap();
        assert_eq!(cred.expose(), "from-flag");
        assert_eq!(cred.source(), CredentialSource::Flag);

        let cred = ApiCredential::resolve(Some(String::new()), "GOVBENCH_TEST_KEY_RESOLVE").unwrap();
        assert_eq!(cred.expose(), "from-env");
        assert_eq!(cred.source(), CredentialSource::Environment);

        std::env::remove_var("GOVBENCH_TEST_KEY_RESOLVE");
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = ApiCredential::resolve(None, "GOVBENCH_TEST_KEY_UNSET").unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("GOVBENCH_TEST_KEY_UNSET"));
    }

    #[test]
    fn test_blank_key() {
        assert!(ApiCredential::explicit("  ").is_blank());
        assert!(!ApiCredential::explicit(KEY).is_blank());
    }
}
