//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Production API root.
pub const DEFAULT_ENDPOINT: &str = "https://mandrillapp.com/api/1.0";

/// Client configuration shared by every message a [`Mailer`](crate::Mailer) builds.
#[derive(Debug, Clone)]
pub struct MandrillConfig {
    /// API key sent as `key` in every request body.
    pub api_key: SecretString,
    /// API root, without the `/messages/...` suffix.
    pub endpoint: String,
    /// When set, every message is fanned out to this address instead.
    pub interceptor: Option<String>,
    /// When set, sends report success without calling the API.
    pub skip: bool,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl MandrillConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            interceptor: None,
            skip: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Build config from environment variables.
    ///
    /// `MANDRILL_API_KEY` is required; `MANDRILL_ENDPOINT`,
    /// `MANDRILL_INTERCEPT`, `MANDRILL_SKIP` and `MANDRILL_TIMEOUT_SECS` are
    /// optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("MANDRILL_API_KEY")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("MANDRILL_API_KEY".into()))?;

        let mut config = Self::new(api_key);

        if let Some(endpoint) = lookup("MANDRILL_ENDPOINT").filter(|s| !s.trim().is_empty()) {
            config.endpoint = endpoint.trim().trim_end_matches('/').to_string();
        }

        config.interceptor = lookup("MANDRILL_INTERCEPT")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if let Some(raw) = lookup("MANDRILL_SKIP") {
            config.skip = parse_flag("MANDRILL_SKIP", &raw)?;
        }

        if let Some(raw) = lookup("MANDRILL_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "MANDRILL_TIMEOUT_SECS".into(),
                message: format!("expected a number of seconds, got {raw:?}"),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_api_key() {
        let err = MandrillConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "MANDRILL_API_KEY"));
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = MandrillConfig::from_lookup(lookup(&[("MANDRILL_API_KEY", "abc")])).unwrap();
        assert_eq!(config.api_key.expose_secret(), "abc");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.interceptor.is_none());
        assert!(!config.skip);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn reads_all_optional_values() {
        let config = MandrillConfig::from_lookup(lookup(&[
            ("MANDRILL_API_KEY", "abc"),
            ("MANDRILL_ENDPOINT", "http://localhost:9000/api/"),
            ("MANDRILL_INTERCEPT", " qa@x.com "),
            ("MANDRILL_SKIP", "yes"),
            ("MANDRILL_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "http://localhost:9000/api");
        assert_eq!(config.interceptor.as_deref(), Some("qa@x.com"));
        assert!(config.skip);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_values() {
        let err = MandrillConfig::from_lookup(lookup(&[
            ("MANDRILL_API_KEY", "abc"),
            ("MANDRILL_SKIP", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MANDRILL_SKIP"));

        let err = MandrillConfig::from_lookup(lookup(&[
            ("MANDRILL_API_KEY", "abc"),
            ("MANDRILL_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MANDRILL_TIMEOUT_SECS"));
    }
}
