//! Identifier casing and the pass-scoped naming registry.
//!
//! Every identifier that ends up in generated code goes through this module: schema names,
//! operation ids turned into method names, property names and enum members. Casing is
//! acronym-preserving: the first character of each word is upper-cased and the rest of the
//! word is kept as written, so `HTTPStatus` stays `HTTPStatus` and `user_id` becomes `UserId`.

use log::debug;
use std::collections::{HashMap, HashSet};

/// C# keywords that cannot be used as plain parameter or local names.
const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

/// Framework and BCL type names that are in scope in every generated file.
///
/// A schema with one of these names keeps its name but is referenced through the models
/// namespace, so `Task` never shadows `System.Threading.Tasks.Task`.
const SYSTEM_TYPE_NAMES: &[&str] = &[
    "Action", "Activity", "Array", "Attribute", "Buffer", "CancellationToken", "Console",
    "Convert", "DateTime", "Delegate", "Directory", "Encoding", "Enum", "Environment",
    "Exception", "File", "Func", "Guid", "HttpClient", "HttpContext", "HttpMethod",
    "HttpRequest", "HttpResponse", "IFormFile", "IResult", "Index", "JsonContent", "Lazy",
    "Math", "Monitor", "Nullable", "Object", "Path", "ProblemDetails", "Random", "Range",
    "Results", "Stream", "String", "Task", "Thread", "TimeSpan", "Timer", "Tuple", "Type",
    "TypedResults", "Uri", "ValueTask", "Version",
];

/// Replaces every character that cannot appear in an identifier with an underscore.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Converts an arbitrary name to PascalCase, preserving acronyms.
///
/// Dots, dashes, spaces and other separators are sanitized to underscores first and then
/// act as word boundaries. A leading digit is prefixed with an underscore.
pub fn to_pascal_case(raw: &str) -> String {
    let sanitized = sanitize_identifier(raw);
    let mut result = String::with_capacity(sanitized.len());

    for word in sanitized.split('_').filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }

    if result.is_empty() {
        return "Unnamed".to_string();
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

/// Converts a name to camelCase for parameters and locals, escaping keywords with `@`.
pub fn to_camel_case(raw: &str) -> String {
    let pascal = to_pascal_case(raw);
    let chars: Vec<char> = pascal.chars().collect();

    // Length of the leading upper-case run, e.g. 3 for "URLValue" ("URLV").
    let upper_run = chars.iter().take_while(|c| c.is_ascii_uppercase()).count();
    let lower_count = match upper_run {
        0 => 0,
        n if n == chars.len() => n,
        1 => 1,
        // Keep the last capital of an acronym run: "URLValue" -> "urlValue".
        n if chars[n].is_ascii_lowercase() => n - 1,
        n => n,
    };

    let camel: String = chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < lower_count { c.to_ascii_lowercase() } else { *c })
        .collect();

    if is_keyword(&camel) {
        format!("@{}", camel)
    } else {
        camel
    }
}

/// Converts a name to snake_case, splitting acronyms from the word that follows them.
pub fn to_snake_case(raw: &str) -> String {
    let sanitized = sanitize_identifier(raw);
    let chars: Vec<char> = sanitized.chars().collect();
    let mut result = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            continue;
        }
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary && !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
        }
        result.push(c.to_ascii_lowercase());
    }

    result.trim_end_matches('_').to_string()
}

/// Returns the member name for a property, suffixed with `Value` when it would clash with
/// the enclosing type's name.
pub fn member_name(property: &str, enclosing_type: &str) -> String {
    let name = to_pascal_case(property);
    if name.eq_ignore_ascii_case(enclosing_type) {
        format!("{}Value", name)
    } else {
        name
    }
}

/// English plural of a PascalCase word, used to merge `/pet` and `/pets` groups.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &word[..word.len() - 1])
    } else if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

pub fn is_keyword(name: &str) -> bool {
    CSHARP_KEYWORDS.contains(&name)
}

pub fn is_system_type(name: &str) -> bool {
    SYSTEM_TYPE_NAMES.contains(&name)
}

/// Pass-scoped registry mapping raw schema identifiers to emitted type names.
///
/// Resolution is idempotent and guarantees that two distinct raw names never share an
/// emitted name. Generated names (inline records, result types) are reserved through the
/// same registry so they cannot collide with component schemas either.
#[derive(Debug, Clone)]
pub struct ConflictRegistry {
    models_namespace: String,
    /// Raw identifier -> emitted name
    resolved: HashMap<String, String>,
    /// Emitted name -> raw identifier that owns it
    owners: HashMap<String, String>,
}

impl ConflictRegistry {
    pub fn new(models_namespace: impl Into<String>) -> Self {
        Self {
            models_namespace: models_namespace.into(),
            resolved: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Registers all component schema names up front.
    ///
    /// Names are claimed in sorted order so the disambiguation suffixes do not depend on
    /// the order in which the document lists its components.
    pub fn register_components<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        let mut sorted: Vec<&String> = names.into_iter().collect();
        sorted.sort();
        for name in sorted {
            self.resolve_type_name(name);
        }
    }

    /// Resolves a raw schema identifier to its unique emitted type name.
    pub fn resolve_type_name(&mut self, raw: &str) -> String {
        if let Some(existing) = self.resolved.get(raw) {
            return existing.clone();
        }

        let base = to_pascal_case(raw);
        let name = self.claim(&base, raw);
        if name != base {
            debug!("Type name {} for '{}' disambiguated to {}", base, raw, name);
        }
        self.resolved.insert(raw.to_string(), name.clone());
        name
    }

    /// Resolves a raw identifier and qualifies it for use at a reference site.
    pub fn resolve_qualified(&mut self, raw: &str) -> String {
        let name = self.resolve_type_name(raw);
        self.qualify(&name)
    }

    /// Reserves a generated (already PascalCase) name, returning a unique variant of it.
    ///
    /// Reserving the same generated name twice returns the same result.
    pub fn reserve(&mut self, generated: &str) -> String {
        let key = format!("#generated/{}", generated);
        if let Some(existing) = self.resolved.get(&key) {
            return existing.clone();
        }
        let name = self.claim(generated, &key);
        self.resolved.insert(key, name.clone());
        name
    }

    /// Returns the name to use when referencing a type from generated code.
    ///
    /// Names that collide with framework types are qualified with the models namespace.
    pub fn qualify(&self, emitted: &str) -> String {
        if is_system_type(emitted) {
            format!("{}.{}", self.models_namespace, emitted)
        } else {
            emitted.to_string()
        }
    }

    /// Whether the emitted name is already taken.
    pub fn is_taken(&self, emitted: &str) -> bool {
        self.owners.contains_key(emitted)
    }

    pub fn models_namespace(&self) -> &str {
        &self.models_namespace
    }

    fn claim(&mut self, base: &str, owner: &str) -> String {
        let mut candidate = base.to_string();
        let mut suffix = 2;
        while let Some(existing_owner) = self.owners.get(&candidate) {
            if existing_owner == owner {
                return candidate;
            }
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
        self.owners.insert(candidate.clone(), owner.to_string());
        candidate
    }
}

/// Member or local names declared inside one record or method.
///
/// A name claimed twice gets a numeric suffix, so `id` bound from both the route and the
/// query becomes `Id` and `Id2`.
#[derive(Debug, Clone, Default)]
pub struct MemberScope {
    taken: HashSet<String>,
}

impl MemberScope {
    /// A scope for the members of `type_name`; the type name itself is unavailable.
    pub fn for_type(type_name: &str) -> Self {
        let mut scope = Self::default();
        scope.taken.insert(type_name.to_string());
        scope
    }

    pub fn claim(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}{}", name, suffix);
            suffix += 1;
        }
        if candidate != name {
            debug!("Member {} renamed to {}", name, candidate);
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}
