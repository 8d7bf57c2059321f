use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::config::EmailValidationSettings;

/// Verdict from an email-quality provider.
#[derive(Debug, Clone, Default)]
pub struct EmailValidationResult {
    pub valid: bool,
    pub reason: Option<String>,
    pub suggestion: Option<String>,
    pub is_disposable: Option<bool>,
    pub score: Option<f32>,
}

#[derive(Debug, thiserror::Error)]
#[error("Email validation provider '{provider}' failed: {message}")]
pub struct ProviderError {
    pub provider: &'static str,
    pub message: String,
}

/// Pluggable email-quality capability. Implementations are registered by name
/// and selected through configuration at startup.
#[async_trait]
pub trait EmailValidator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn validate(&self, email: &str) -> Result<EmailValidationResult, ProviderError>;
}

fn format_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email format regex is valid")
    })
}

/// Plain syntactic check, also the fallback when a provider is unavailable.
pub fn format_is_valid(email: &str) -> bool {
    format_regex().is_match(email)
}

/// Format-only provider; the default.
pub struct BasicFormatValidator;

#[async_trait]
impl EmailValidator for BasicFormatValidator {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn validate(&self, email: &str) -> Result<EmailValidationResult, ProviderError> {
        let valid = format_is_valid(email);
        Ok(EmailValidationResult {
            valid,
            reason: (!valid).then(|| "Invalid email format".to_string()),
            ..EmailValidationResult::default()
        })
    }
}

const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "yopmail.com",
    "tempmail.com",
    "trashmail.com",
    "sharklasers.com",
    "getnada.com",
];

const TYPO_DOMAINS: &[(&str, &str)] = &[
    ("gmial.com", "gmail.com"),
    ("gamil.com", "gmail.com"),
    ("gmai.com", "gmail.com"),
    ("hotmial.com", "hotmail.com"),
    ("yaho.com", "yahoo.com"),
    ("outlok.com", "outlook.com"),
];

/// Format check plus a built-in disposable-domain denylist and common-typo
/// suggestions.
pub struct DenylistValidator;

#[async_trait]
impl EmailValidator for DenylistValidator {
    fn name(&self) -> &'static str {
        "denylist"
    }

    async fn validate(&self, email: &str) -> Result<EmailValidationResult, ProviderError> {
        if !format_is_valid(email) {
            return Ok(EmailValidationResult {
                valid: false,
                reason: Some("Invalid email format".to_string()),
                ..EmailValidationResult::default()
            });
        }

        let domain = email.rsplit('@').next().unwrap_or("").to_ascii_lowercase();

        if DISPOSABLE_DOMAINS.contains(&domain.as_str()) {
            return Ok(EmailValidationResult {
                valid: false,
                reason: Some("Disposable email addresses are not accepted".to_string()),
                is_disposable: Some(true),
                ..EmailValidationResult::default()
            });
        }

        if let Some((_, fix)) = TYPO_DOMAINS.iter().find(|(typo, _)| *typo == domain) {
            let local = email.split('@').next().unwrap_or("");
            return Ok(EmailValidationResult {
                valid: true,
                suggestion: Some(format!("{}@{}", local, fix)),
                ..EmailValidationResult::default()
            });
        }

        Ok(EmailValidationResult {
            valid: true,
            ..EmailValidationResult::default()
        })
    }
}

/// Owns the provider lookup table and applies the configured provider with
/// fallback semantics: provider errors degrade to the basic format check and
/// never hard-fail the caller.
pub struct EmailValidationService {
    enabled: bool,
    provider: Arc<dyn EmailValidator>,
}

impl EmailValidationService {
    pub fn new(settings: &EmailValidationSettings) -> Self {
        let mut providers: HashMap<&'static str, Arc<dyn EmailValidator>> = HashMap::new();
        providers.insert("basic", Arc::new(BasicFormatValidator));
        providers.insert("denylist", Arc::new(DenylistValidator));

        let provider: Arc<dyn EmailValidator> = match providers.remove(settings.provider.as_str()) {
            Some(p) => p,
            None => {
                tracing::warn!(
                    provider = %settings.provider,
                    "Unknown email validation provider, falling back to basic"
                );
                Arc::new(BasicFormatValidator)
            }
        };

        Self {
            enabled: settings.enabled,
            provider,
        }
    }

    /// Constructor for callers that already hold a provider (tests, embedders).
    pub fn with_provider(enabled: bool, provider: Arc<dyn EmailValidator>) -> Self {
        Self { enabled, provider }
    }

    /// Check an address ahead of registration or email change.
    ///
    /// Returns `None` when the address is acceptable, `Some(reason)` when it
    /// should be rejected. Disabled validation accepts everything.
    pub async fn check(&self, email: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        match self.provider.validate(email).await {
            Ok(result) => {
                if !result.valid {
                    return Some(
                        result
                            .reason
                            .unwrap_or_else(|| "Email address failed validation".to_string()),
                    );
                }
                if let Some(suggestion) = result.suggestion {
                    return Some(format!(
                        "Email address looks mistyped. Did you mean {}?",
                        suggestion
                    ));
                }
                None
            }
            Err(e) => {
                // Provider outage must not block signups
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Email validation provider failed, using format check"
                );
                if format_is_valid(email) {
                    None
                } else {
                    Some("Invalid email format".to_string())
                }
            }
        }
    }
}
