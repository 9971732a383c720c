//! Provider configuration values
//!
//! Configuration is passed explicitly to each provider constructor. The only
//! implicit input is the documented API-key environment variable, consulted
//! once at construction when no key is configured.

use std::time::Duration;

use anyhow::Context;
use indexmap::IndexMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::error::LlmError;
use crate::provider::ProviderKind;

/// Connection settings shared by every provider
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Whole-request timeout for the HTTP client (e.g. "30s", "2m")
    #[serde(default)]
    pub timeout: Option<String>,
}

impl ProviderConfig {
    /// Set an explicit API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Point the provider at a different endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the HTTP client timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Configured key, else the first non-empty variable in `env_vars`
    pub fn resolve_api_key(&self, env_vars: &[&str]) -> Option<SecretString> {
        if let Some(key) = &self.api_key
            && !key.expose_secret().is_empty()
        {
            return Some(key.clone());
        }

        env_vars
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .map(SecretString::from)
    }

    /// Configured key or env fallback, failing when neither is present
    pub fn require_api_key(&self, provider: &str, env_vars: &[&str]) -> Result<SecretString, LlmError> {
        self.resolve_api_key(env_vars).ok_or_else(|| LlmError::MissingApiKey {
            provider: provider.to_owned(),
            env_var: env_vars.first().copied().unwrap_or_default().to_owned(),
        })
    }

    /// Configured base URL, else `default`
    pub fn resolve_base_url(&self, default: &str) -> Result<Url, LlmError> {
        match &self.base_url {
            Some(url) => Ok(url.clone()),
            None => Url::parse(default)
                .with_context(|| format!("invalid default base URL {default}"))
                .map_err(LlmError::Internal),
        }
    }

    /// Parsed timeout, if configured
    pub fn timeout_duration(&self) -> Result<Option<Duration>, LlmError> {
        self.timeout
            .as_deref()
            .map(|s| duration_str::parse(s).map_err(|e| anyhow::anyhow!("invalid timeout '{s}': {e}")))
            .transpose()
            .map_err(LlmError::Internal)
    }

    /// HTTP client honoring the configured timeout
    pub fn http_client(&self) -> Result<Client, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout_duration()? {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .context("failed to build HTTP client")
            .map_err(LlmError::Internal)
    }
}

/// Named provider entries, typically loaded from TOML
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Provider entries keyed by name, in declaration order
    #[serde(default)]
    pub providers: IndexMap<String, ProviderEntry>,
}

impl ProvidersConfig {
    /// Parse a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, LlmError> {
        toml::from_str(input)
            .context("failed to parse provider configuration")
            .map_err(LlmError::Internal)
    }
}

/// One configured provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEntry {
    /// Backend protocol
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// HTTP client timeout
    #[serde(default)]
    pub timeout: Option<String>,
}

impl ProviderEntry {
    /// Connection settings for this entry
    pub fn config(&self) -> ProviderConfig {
        ProviderConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            timeout: self.timeout.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn explicit_key_wins_over_env() {
        temp_env::with_var("TEST_PROVIDER_KEY", Some("from-env"), || {
            let config = ProviderConfig::default().with_api_key("explicit");
            let key = config.resolve_api_key(&["TEST_PROVIDER_KEY"]).unwrap();
            assert_eq!(key.expose_secret(), "explicit");
        });
    }

    #[test]
    fn env_fallback_in_listed_order() {
        temp_env::with_vars(
            [("TEST_PRIMARY_KEY", Some("")), ("TEST_SECONDARY_KEY", Some("second"))],
            || {
                let key = ProviderConfig::default()
                    .resolve_api_key(&["TEST_PRIMARY_KEY", "TEST_SECONDARY_KEY"])
                    .unwrap();
                assert_eq!(key.expose_secret(), "second");
            },
        );
    }

    #[test]
    fn missing_key_names_primary_env_var() {
        temp_env::with_vars_unset(["TEST_PRIMARY_KEY", "TEST_SECONDARY_KEY"], || {
            let err = ProviderConfig::default()
                .require_api_key("gemini", &["TEST_PRIMARY_KEY", "TEST_SECONDARY_KEY"])
                .unwrap_err();
            assert!(matches!(
                err,
                LlmError::MissingApiKey { ref provider, ref env_var }
                    if provider == "gemini" && env_var == "TEST_PRIMARY_KEY"
            ));
        });
    }

    #[test]
    fn timeout_is_parsed() {
        let config = ProviderConfig::default().with_timeout("30s");
        assert_eq!(config.timeout_duration().unwrap(), Some(Duration::from_secs(30)));

        let config = ProviderConfig::default().with_timeout("soon");
        assert!(config.timeout_duration().is_err());
    }

    #[test]
    fn default_base_url_applies() {
        let url = ProviderConfig::default()
            .resolve_base_url("https://api.deepseek.com")
            .unwrap();
        assert_eq!(url.host_str(), Some("api.deepseek.com"));
    }

    #[test]
    fn providers_load_from_toml_in_order() {
        let config = ProvidersConfig::from_toml_str(indoc! {r#"
            [providers.mistral]
            type = "mistral"
            api_key = "mst"

            [providers.claude]
            type = "anthropic"
            api_key = "sk-ant"

            [providers.local]
            type = "llamacpp"
            base_url = "http://localhost:9090/v1"
            timeout = "2m"
        "#})
        .unwrap();

        let names: Vec<&str> = config.providers.keys().map(String::as_str).collect();
        assert_eq!(names, ["mistral", "claude", "local"]);

        let local = &config.providers["local"];
        assert_eq!(local.kind, ProviderKind::LlamaCpp);
        assert_eq!(local.config().base_url.unwrap().port(), Some(9090));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = ProvidersConfig::from_toml_str(indoc! {r#"
            [providers.x]
            type = "groq"
            region = "us-east-1"
        "#});
        assert!(result.is_err());
    }
}
