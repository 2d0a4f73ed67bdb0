use super::extensions::{get_str, get_u32, ExtensionScope};
use super::{NamedPolicy, RenamablePolicy};
use crate::naming::to_pascal_case;
use crate::snippets;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

pub const RATE_LIMIT_KEYS: &[&str] = &["x-rate-limit", "x-ratelimit"];

pub const DEFAULT_POLICY_NAME: &str = "Default";
pub const DEFAULT_WINDOW_SECONDS: u32 = 60;
pub const DEFAULT_PERMIT_LIMIT: u32 = 100;
pub const DEFAULT_QUEUE_LIMIT: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RateLimitAlgorithm {
    FixedWindow,
    SlidingWindow,
    TokenBucket,
    Concurrency,
}

impl RateLimitAlgorithm {
    /// Accepts `fixed`, `fixed-window`, `fixedWindow`, `FixedWindow` and the like.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "fixed" | "fixedwindow" => Some(Self::FixedWindow),
            "sliding" | "slidingwindow" => Some(Self::SlidingWindow),
            "token" | "tokenbucket" => Some(Self::TokenBucket),
            "concurrency" | "concurrent" => Some(Self::Concurrency),
            _ => None,
        }
    }

    /// Limiter registration method on `RateLimiterOptions`.
    pub fn registration_method(&self) -> &'static str {
        match self {
            Self::FixedWindow => "AddFixedWindowLimiter",
            Self::SlidingWindow => "AddSlidingWindowLimiter",
            Self::TokenBucket => "AddTokenBucketLimiter",
            Self::Concurrency => "AddConcurrencyLimiter",
        }
    }
}

/// A named rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitPolicy {
    pub name: String,
    pub algorithm: RateLimitAlgorithm,
    pub permit_limit: u32,
    pub window_seconds: u32,
    pub queue_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments_per_window: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_per_period: Option<u32>,
}

impl RateLimitPolicy {
    pub fn named(name: &str) -> Self {
        Self {
            name: to_pascal_case(name),
            algorithm: RateLimitAlgorithm::FixedWindow,
            permit_limit: DEFAULT_PERMIT_LIMIT,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            segments_per_window: None,
            tokens_per_period: None,
        }
    }

    pub fn registration(&self) -> String {
        snippets::rate_limit_registration(self)
    }
}

impl NamedPolicy for RateLimitPolicy {
    fn policy_name(&self) -> &str {
        &self.name
    }
}

impl RenamablePolicy for RateLimitPolicy {
    fn rename(&mut self, name: String) {
        self.name = name;
    }
}

/// Reads the effective rate limit of an operation.
///
/// `false` disables limiting, `true` applies the defaults and a bare string names a policy
/// that uses the defaults.
pub fn extract_rate_limit(scope: &ExtensionScope<'_>) -> Option<RateLimitPolicy> {
    let value = scope.lookup(RATE_LIMIT_KEYS)?;
    let policy = match value {
        Value::Bool(false) | Value::Null => return None,
        Value::Bool(true) => RateLimitPolicy::named(DEFAULT_POLICY_NAME),
        Value::String(name) => RateLimitPolicy::named(name),
        Value::Object(_) => from_object(value),
        other => {
            warn!("Ignoring rate limit extension with unexpected value {}", other);
            return None;
        }
    };
    debug!("Rate limit policy {} ({:?})", policy.name, policy.algorithm);
    Some(policy)
}

fn from_object(value: &Value) -> RateLimitPolicy {
    let name = get_str(value, "name")
        .or_else(|| get_str(value, "policy"))
        .unwrap_or(DEFAULT_POLICY_NAME);
    let mut policy = RateLimitPolicy::named(name);

    if let Some(raw) = get_str(value, "algorithm").or_else(|| get_str(value, "type")) {
        match RateLimitAlgorithm::parse(raw) {
            Some(algorithm) => policy.algorithm = algorithm,
            None => warn!("Unknown rate limit algorithm '{}', using fixed window", raw),
        }
    }

    if let Some(permits) = first_u32(value, &["permitLimit", "permits", "requests", "limit"]) {
        policy.permit_limit = permits;
    }
    if let Some(window) = first_u32(value, &["windowSeconds", "window", "periodSeconds"]) {
        policy.window_seconds = window;
    }
    if let Some(queue) = first_u32(value, &["queueLimit", "queue"]) {
        policy.queue_limit = queue;
    }

    match policy.algorithm {
        RateLimitAlgorithm::SlidingWindow => {
            policy.segments_per_window = Some(get_u32(value, "segmentsPerWindow").unwrap_or(4));
        }
        RateLimitAlgorithm::TokenBucket => {
            policy.tokens_per_period =
                Some(get_u32(value, "tokensPerPeriod").unwrap_or(policy.permit_limit));
        }
        RateLimitAlgorithm::FixedWindow | RateLimitAlgorithm::Concurrency => {}
    }

    policy
}

fn first_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|key| get_u32(value, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Extensions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn extract(value: Value) -> Option<RateLimitPolicy> {
        let operation: Extensions = serde_json::from_value(json!({ "x-rate-limit": value })).unwrap();
        let empty = Extensions::new();
        extract_rate_limit(&ExtensionScope::new(&operation, &empty, &empty))
    }

    #[test]
    fn test_burst_policy() {
        let policy = extract(json!({ "name": "burst", "permitLimit": 20, "windowSeconds": 10 })).unwrap();
        assert_eq!(policy.name, "Burst");
        assert_eq!(policy.algorithm, RateLimitAlgorithm::FixedWindow);
        assert_eq!(policy.permit_limit, 20);
        assert_eq!(policy.window_seconds, 10);
        assert_eq!(policy.queue_limit, 0);
    }

    #[test]
    fn test_policy_key_names_the_policy() {
        let policy = extract(json!({ "policy": "burst", "permitLimit": 20, "windowSeconds": 10 })).unwrap();
        assert_eq!(policy.name, "Burst");
        assert_eq!(policy.permit_limit, 20);
        assert_eq!(policy.window_seconds, 10);
        assert_eq!(policy.queue_limit, 0);
    }

    #[test]
    fn test_defaults() {
        let policy = extract(json!(true)).unwrap();
        assert_eq!(policy, RateLimitPolicy::named("Default"));
        assert_eq!(policy.window_seconds, 60);
        assert_eq!(policy.permit_limit, 100);
        assert_eq!(extract(json!("strict")).unwrap().name, "Strict");
        assert!(extract(json!(false)).is_none());
    }

    #[test]
    fn test_algorithms() {
        assert_eq!(RateLimitAlgorithm::parse("token-bucket"), Some(RateLimitAlgorithm::TokenBucket));
        assert_eq!(RateLimitAlgorithm::parse("SlidingWindow"), Some(RateLimitAlgorithm::SlidingWindow));
        assert_eq!(RateLimitAlgorithm::parse("leaky"), None);

        let sliding = extract(json!({ "algorithm": "sliding", "permitLimit": 5 })).unwrap();
        assert_eq!(sliding.segments_per_window, Some(4));
        let bucket = extract(json!({ "algorithm": "tokenBucket", "permitLimit": 5 })).unwrap();
        assert_eq!(bucket.tokens_per_period, Some(5));
    }

    #[test]
    fn test_registration_snippet() {
        let policy = extract(json!({ "name": "Burst", "permitLimit": 20, "windowSeconds": 10 })).unwrap();
        let snippet = policy.registration();
        assert!(snippet.starts_with("options.AddFixedWindowLimiter(\"Burst\", limiter =>"));
        assert!(snippet.contains("limiter.PermitLimit = 20;"));
        assert!(snippet.contains("limiter.Window = TimeSpan.FromSeconds(10);"));
        assert!(snippet.contains("limiter.QueueLimit = 0;"));
    }
}
