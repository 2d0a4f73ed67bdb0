use super::extensions::{get_bool, get_str, get_string_list, get_u32, ExtensionScope};
use super::{NamedPolicy, RenamablePolicy};
use crate::naming::to_pascal_case;
use crate::snippets;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

pub const CACHE_KEYS: &[&str] = &["x-cache", "x-output-cache"];

pub const DEFAULT_EXPIRATION_SECONDS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheKind {
    /// Server-side output caching
    Output,
    /// `Cache-Control` response headers only
    Response,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachePolicy {
    pub name: String,
    pub kind: CacheKind,
    pub expiration_seconds: u32,
    pub vary_by_query: Vec<String>,
    pub vary_by_header: Vec<String>,
    pub vary_by_route: Vec<String>,
    pub tags: Vec<String>,
    pub no_store: bool,
}

impl CachePolicy {
    pub fn with_expiration(expiration_seconds: u32) -> Self {
        Self {
            name: format!("Cache{}Seconds", expiration_seconds),
            kind: CacheKind::Output,
            expiration_seconds,
            vary_by_query: Vec::new(),
            vary_by_header: Vec::new(),
            vary_by_route: Vec::new(),
            tags: Vec::new(),
            no_store: false,
        }
    }

    /// `AddOutputCache` policy registration; response caching needs none.
    pub fn registration(&self) -> Option<String> {
        match self.kind {
            CacheKind::Output => Some(snippets::output_cache_registration(self)),
            CacheKind::Response => None,
        }
    }
}

impl NamedPolicy for CachePolicy {
    fn policy_name(&self) -> &str {
        &self.name
    }
}

impl RenamablePolicy for CachePolicy {
    fn rename(&mut self, name: String) {
        self.name = name;
    }
}

/// Reads the effective cache policy of an operation.
///
/// A number is the expiration in seconds, `true` uses the default expiration and `false`
/// disables caching.
pub fn extract_cache(scope: &ExtensionScope<'_>) -> Option<CachePolicy> {
    let value = scope.lookup(CACHE_KEYS)?;
    let policy = match value {
        Value::Bool(false) | Value::Null => return None,
        Value::Bool(true) => CachePolicy::with_expiration(DEFAULT_EXPIRATION_SECONDS),
        Value::Number(seconds) => match seconds.as_u64().and_then(|s| u32::try_from(s).ok()) {
            Some(seconds) => CachePolicy::with_expiration(seconds),
            None => {
                warn!("Ignoring cache extension with expiration {}", seconds);
                return None;
            }
        },
        Value::Object(_) => from_object(value),
        other => {
            warn!("Ignoring cache extension with unexpected value {}", other);
            return None;
        }
    };
    debug!("Cache policy {} ({}s)", policy.name, policy.expiration_seconds);
    Some(policy)
}

fn from_object(value: &Value) -> CachePolicy {
    let expiration = get_u32(value, "expirationSeconds")
        .or_else(|| get_u32(value, "duration"))
        .or_else(|| get_u32(value, "maxAge"))
        .unwrap_or(DEFAULT_EXPIRATION_SECONDS);
    let mut policy = CachePolicy::with_expiration(expiration);

    if let Some(name) = get_str(value, "name").or_else(|| get_str(value, "policy")) {
        policy.name = to_pascal_case(name);
    }
    if let Some(kind) = get_str(value, "type").or_else(|| get_str(value, "kind")) {
        policy.kind = match kind.to_ascii_lowercase().as_str() {
            "response" => CacheKind::Response,
            "output" => CacheKind::Output,
            other => {
                warn!("Unknown cache kind '{}', using output caching", other);
                CacheKind::Output
            }
        };
    }

    policy.vary_by_query = get_string_list(value, "varyByQuery");
    policy.vary_by_header = get_string_list(value, "varyByHeader");
    policy.vary_by_route = get_string_list(value, "varyByRoute");
    policy.tags = get_string_list(value, "tags");
    policy.no_store = get_bool(value, "noStore").unwrap_or(false);
    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Extensions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn extract_at_document(value: Value) -> Option<CachePolicy> {
        let document: Extensions = serde_json::from_value(json!({ "x-output-cache": value })).unwrap();
        let empty = Extensions::new();
        extract_cache(&ExtensionScope::new(&empty, &empty, &document))
    }

    #[test]
    fn test_defaults() {
        let policy = extract_at_document(json!(true)).unwrap();
        assert_eq!(policy.expiration_seconds, 60);
        assert_eq!(policy.kind, CacheKind::Output);
        assert_eq!(extract_at_document(json!(300)).unwrap().name, "Cache300Seconds");
        assert!(extract_at_document(json!(false)).is_none());
    }

    #[test]
    fn test_object_form() {
        let policy = extract_at_document(json!({
            "name": "pet-list",
            "expirationSeconds": 30,
            "varyByQuery": ["page", "limit"],
            "tags": "pets"
        }))
        .unwrap();
        assert_eq!(policy.name, "PetList");
        assert_eq!(policy.vary_by_query, vec!["page", "limit"]);
        assert_eq!(policy.tags, vec!["pets"]);

        let snippet = policy.registration().unwrap();
        assert!(snippet.contains("options.AddPolicy(\"PetList\""));
        assert!(snippet.contains("Expire(TimeSpan.FromSeconds(30))"));
        assert!(snippet.contains("SetVaryByQuery(\"page\", \"limit\")"));
    }

    #[test]
    fn test_response_cache_has_no_registration() {
        let policy = extract_at_document(json!({ "type": "response" })).unwrap();
        assert_eq!(policy.kind, CacheKind::Response);
        assert!(policy.registration().is_none());
    }
}
