//! Delegate configuration sourced from the process environment

use crate::engine::{EnginePrep, ResolverConfig};
use serde::{Deserialize, Serialize};

const RECAPTCHA_PROVIDER_VAR: &str = "RECAPTCHA_RESOLVER_PROVIDER";
const RECAPTCHA_TOKEN_VAR: &str = "RECAPTCHA_RESOLVER_TOKEN";
const LOG_BROWSER_CONSOLE_VAR: &str = "LOG_BROWSER_CONSOLE";

/// Delegate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// CAPTCHA resolver provider id
    pub recaptcha_provider: Option<String>,

    /// CAPTCHA resolver API token; empty is an accepted default
    pub recaptcha_token: String,

    /// Forward browser console events into the process logger
    pub log_browser_console: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recaptcha_provider: None,
            recaptcha_token: String::new(),
            log_browser_console: false,
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            recaptcha_provider: lookup(RECAPTCHA_PROVIDER_VAR).filter(|v| !v.is_empty()),
            recaptcha_token: lookup(RECAPTCHA_TOKEN_VAR).unwrap_or_default(),
            log_browser_console: lookup(LOG_BROWSER_CONSOLE_VAR)
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
        }
    }

    /// Engine preparation derived from the current configuration. Rebuilt
    /// per instruction; values may change between calls.
    pub fn engine_prep(&self) -> EnginePrep {
        EnginePrep {
            mask_identity: true,
            resolver: ResolverConfig {
                provider: self.recaptcha_provider.clone(),
                token: self.recaptcha_token.clone(),
            },
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.recaptcha_provider.is_none());
        assert!(config.recaptcha_token.is_empty());
        assert!(!config.log_browser_console);
    }

    #[test]
    fn test_from_lookup_empty_environment() {
        let config = Config::from_lookup(|_| None);
        assert!(config.recaptcha_provider.is_none());
        assert!(config.recaptcha_token.is_empty());
        assert!(!config.log_browser_console);
    }

    #[test]
    fn test_from_lookup_reads_all_options() {
        let config = Config::from_lookup(|name| match name {
            "RECAPTCHA_RESOLVER_PROVIDER" => Some("2captcha".to_string()),
            "RECAPTCHA_RESOLVER_TOKEN" => Some("tok-123".to_string()),
            "LOG_BROWSER_CONSOLE" => Some("true".to_string()),
            _ => None,
        });
        assert_eq!(config.recaptcha_provider.as_deref(), Some("2captcha"));
        assert_eq!(config.recaptcha_token, "tok-123");
        assert!(config.log_browser_console);
    }

    #[test]
    fn test_empty_provider_is_treated_as_unset() {
        let config = Config::from_lookup(|name| match name {
            "RECAPTCHA_RESOLVER_PROVIDER" => Some(String::new()),
            _ => None,
        });
        assert!(config.recaptcha_provider.is_none());
    }

    #[test]
    fn test_truthy_forms() {
        for form in ["1", "true", "TRUE", "yes", "on", " On "] {
            let config = Config::from_lookup(move |name| match name {
                "LOG_BROWSER_CONSOLE" => Some(form.to_string()),
                _ => None,
            });
            assert!(config.log_browser_console, "expected {form:?} to enable");
        }
        for form in ["0", "false", "off", "", "nope"] {
            let config = Config::from_lookup(move |name| match name {
                "LOG_BROWSER_CONSOLE" => Some(form.to_string()),
                _ => None,
            });
            assert!(!config.log_browser_console, "expected {form:?} to disable");
        }
    }

    #[test]
    fn test_engine_prep_mirrors_config() {
        let config = Config {
            recaptcha_provider: Some("capmonster".to_string()),
            recaptcha_token: "tok".to_string(),
            log_browser_console: false,
        };
        let prep = config.engine_prep();
        assert!(prep.mask_identity);
        assert_eq!(prep.resolver.provider.as_deref(), Some("capmonster"));
        assert_eq!(prep.resolver.token, "tok");
    }

    #[test]
    fn test_empty_token_is_accepted() {
        let prep = Config::default().engine_prep();
        assert_eq!(prep.resolver.token, "");
    }
}
