use super::extensions::{get_bool, get_f64, get_str, get_u32, ExtensionScope};
use super::{NamedPolicy, RenamablePolicy};
use crate::naming::to_pascal_case;
use crate::snippets;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

pub const RESILIENCE_KEYS: &[&str] = &["x-retry", "x-resilience"];

pub const DEFAULT_PIPELINE_NAME: &str = "Default";
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY_MS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackoffKind {
    Constant,
    Linear,
    Exponential,
}

impl BackoffKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "constant" | "fixed" => Some(Self::Constant),
            "linear" => Some(Self::Linear),
            "exponential" => Some(Self::Exponential),
            _ => None,
        }
    }

    /// `DelayBackoffType` member name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "Constant",
            Self::Linear => "Linear",
            Self::Exponential => "Exponential",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSettings {
    pub failure_ratio: f64,
    pub sampling_duration_seconds: u32,
    pub minimum_throughput: u32,
    pub break_duration_seconds: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            sampling_duration_seconds: 30,
            minimum_throughput: 10,
            break_duration_seconds: 30,
        }
    }
}

/// A named client-side resilience pipeline (retry, optional circuit breaker and timeout).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResiliencePolicy {
    pub name: String,
    pub max_retry_attempts: u32,
    pub backoff: BackoffKind,
    pub delay_ms: u32,
    pub use_jitter: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
}

impl ResiliencePolicy {
    pub fn named(name: &str) -> Self {
        Self {
            name: to_pascal_case(name),
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            backoff: BackoffKind::Exponential,
            delay_ms: DEFAULT_DELAY_MS,
            use_jitter: true,
            circuit_breaker: None,
            timeout_seconds: None,
        }
    }

    pub fn registration(&self) -> String {
        snippets::resilience_registration(self)
    }
}

impl NamedPolicy for ResiliencePolicy {
    fn policy_name(&self) -> &str {
        &self.name
    }
}

impl RenamablePolicy for ResiliencePolicy {
    fn rename(&mut self, name: String) {
        self.name = name;
    }
}

/// Reads the effective resilience pipeline of an operation.
///
/// A number is the retry count with default backoff.
pub fn extract_resilience(scope: &ExtensionScope<'_>) -> Option<ResiliencePolicy> {
    let value = scope.lookup(RESILIENCE_KEYS)?;
    let policy = match value {
        Value::Bool(false) | Value::Null => return None,
        Value::Bool(true) => ResiliencePolicy::named(DEFAULT_PIPELINE_NAME),
        Value::Number(attempts) => {
            let mut policy = ResiliencePolicy::named(DEFAULT_PIPELINE_NAME);
            if let Some(attempts) = attempts.as_u64().and_then(|a| u32::try_from(a).ok()) {
                policy.max_retry_attempts = attempts;
            }
            policy
        }
        Value::Object(_) => from_object(value),
        other => {
            warn!("Ignoring resilience extension with unexpected value {}", other);
            return None;
        }
    };
    debug!(
        "Resilience pipeline {} ({} attempts, {:?})",
        policy.name, policy.max_retry_attempts, policy.backoff
    );
    Some(policy)
}

fn from_object(value: &Value) -> ResiliencePolicy {
    let name = get_str(value, "name").unwrap_or(DEFAULT_PIPELINE_NAME);
    let mut policy = ResiliencePolicy::named(name);

    if let Some(attempts) = get_u32(value, "maxRetryAttempts").or_else(|| get_u32(value, "maxAttempts")) {
        policy.max_retry_attempts = attempts;
    }
    if let Some(raw) = get_str(value, "backoff").or_else(|| get_str(value, "backoffType")) {
        match BackoffKind::parse(raw) {
            Some(backoff) => policy.backoff = backoff,
            None => warn!("Unknown backoff '{}', using exponential", raw),
        }
    }
    if let Some(delay) = get_u32(value, "delayMs").or_else(|| get_u32(value, "baseDelayMs")) {
        policy.delay_ms = delay;
    }
    if let Some(jitter) = get_bool(value, "useJitter").or_else(|| get_bool(value, "jitter")) {
        policy.use_jitter = jitter;
    }
    policy.timeout_seconds = get_u32(value, "timeoutSeconds");

    policy.circuit_breaker = match value.get("circuitBreaker") {
        Some(Value::Bool(true)) => Some(CircuitBreakerSettings::default()),
        Some(breaker @ Value::Object(_)) => {
            let defaults = CircuitBreakerSettings::default();
            Some(CircuitBreakerSettings {
                failure_ratio: get_f64(breaker, "failureRatio").unwrap_or(defaults.failure_ratio),
                sampling_duration_seconds: get_u32(breaker, "samplingDurationSeconds")
                    .unwrap_or(defaults.sampling_duration_seconds),
                minimum_throughput: get_u32(breaker, "minimumThroughput")
                    .unwrap_or(defaults.minimum_throughput),
                break_duration_seconds: get_u32(breaker, "breakDurationSeconds")
                    .unwrap_or(defaults.break_duration_seconds),
            })
        }
        _ => None,
    };

    policy
}
