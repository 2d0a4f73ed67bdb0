use crate::schema::Extensions;
use serde_json::Value;

/// Layered view of vendor extensions for one operation.
///
/// A key is looked up on the operation first, then on its path item, then on the document.
/// The first level that defines the key wins as a whole; values are never merged across
/// levels.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionScope<'a> {
    operation: &'a Extensions,
    path: &'a Extensions,
    document: &'a Extensions,
}

impl<'a> ExtensionScope<'a> {
    pub fn new(operation: &'a Extensions, path: &'a Extensions, document: &'a Extensions) -> Self {
        Self {
            operation,
            path,
            document,
        }
    }

    /// Returns the value of the first of `keys` found at the most specific level.
    pub fn lookup(&self, keys: &[&str]) -> Option<&'a Value> {
        [self.operation, self.path, self.document]
            .into_iter()
            .find_map(|level| keys.iter().find_map(|key| level.get(*key)))
    }
}

pub fn get_u32(value: &Value, key: &str) -> Option<u32> {
    value
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

pub fn get_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

pub fn get_bool(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

pub fn get_str<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

/// A list of strings; a single string is accepted as a one-element list.
pub fn get_string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extensions(value: Value) -> Extensions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_operation_level_wins_whole_object() {
        let operation = extensions(json!({ "x-rate-limit": { "name": "Burst" } }));
        let path = extensions(json!({ "x-rate-limit": { "name": "Path", "permitLimit": 5 } }));
        let document = extensions(json!({ "x-cache": { "expirationSeconds": 10 } }));
        let scope = ExtensionScope::new(&operation, &path, &document);

        let rate_limit = scope.lookup(&["x-rate-limit"]).unwrap();
        assert_eq!(get_str(rate_limit, "name"), Some("Burst"));
        assert_eq!(get_u32(rate_limit, "permitLimit"), None);
        assert!(scope.lookup(&["x-cache"]).is_some());
        assert!(scope.lookup(&["x-retry"]).is_none());
    }

    #[test]
    fn test_alternate_keys() {
        let operation = extensions(json!({ "x-ratelimit": 1 }));
        let empty = Extensions::new();
        let scope = ExtensionScope::new(&operation, &empty, &empty);
        assert!(scope.lookup(&["x-rate-limit", "x-ratelimit"]).is_some());
    }

    #[test]
    fn test_string_list_accepts_single() {
        let value = json!({ "a": "one", "b": ["x", "y"] });
        assert_eq!(get_string_list(&value, "a"), vec!["one"]);
        assert_eq!(get_string_list(&value, "b"), vec!["x", "y"]);
        assert!(get_string_list(&value, "c").is_empty());
    }
}
