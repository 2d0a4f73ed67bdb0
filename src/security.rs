use crate::document::{Document, SecurityRequirement};
use crate::policies::extensions::ExtensionScope;
use crate::policies::oauth;
use crate::snippets;
use log::debug;
use serde::Serialize;
use serde_json::Value;

const ROLE_KEYS: &[&str] = &["x-roles", "x-required-roles"];
const POLICY_KEYS: &[&str] = &["x-authorization-policy", "x-policy"];

/// Effective authorization of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequirement {
    pub schemes: Vec<String>,
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    /// An empty requirement `{}` is one of the alternatives
    pub allow_anonymous: bool,
}

impl AuthRequirement {
    pub fn requires_authentication(&self) -> bool {
        !self.allow_anonymous && (!self.schemes.is_empty() || self.has_restriction())
    }

    /// Role, policy or scope restrictions beyond plain authentication.
    pub fn has_restriction(&self) -> bool {
        !self.roles.is_empty() || self.policy.is_some() || !self.scopes.is_empty()
    }

    /// Endpoint builder calls that apply this requirement.
    pub fn metadata_calls(&self) -> Vec<String> {
        snippets::authorization_calls(self)
    }
}

/// Derives the authorization of an operation from its effective security requirements and
/// the role/policy extensions.
///
/// Returns `None` for public operations.
pub fn derive_auth(
    security: Option<&[SecurityRequirement]>,
    scope: &ExtensionScope<'_>,
) -> Option<AuthRequirement> {
    let requirements = security.unwrap_or_default();

    let mut requirement = AuthRequirement {
        schemes: Vec::new(),
        scopes: Vec::new(),
        roles: roles(scope),
        policy: scope
            .lookup(POLICY_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string),
        allow_anonymous: false,
    };

    for alternative in requirements {
        if alternative.is_empty() {
            requirement.allow_anonymous = true;
            continue;
        }
        for (scheme, scopes) in alternative {
            push_unique(&mut requirement.schemes, scheme);
            for required_scope in scopes {
                push_unique(&mut requirement.scopes, required_scope);
            }
        }
    }

    if requirement.schemes.is_empty() && !requirement.has_restriction() {
        return None;
    }
    debug!(
        "Auth: schemes {:?}, roles {:?}, anonymous {}",
        requirement.schemes, requirement.roles, requirement.allow_anonymous
    );
    Some(requirement)
}

fn roles(scope: &ExtensionScope<'_>) -> Vec<String> {
    match scope.lookup(ROLE_KEYS) {
        Some(Value::String(role)) => vec![role.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// An authentication scheme declared in `components.securitySchemes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSchemeDescriptor {
    pub name: String,
    pub scheme_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Header, query or cookie name of an API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub registration: String,
}

pub fn collect_auth_schemes(document: &Document) -> Vec<AuthSchemeDescriptor> {
    document
        .components
        .security_schemes
        .iter()
        .map(|(name, scheme)| {
            let oauth = oauth::oauth_config(name, scheme);
            let registration = match &oauth {
                Some(config) => config.registration(),
                None => snippets::auth_scheme_registration(name, scheme),
            };
            AuthSchemeDescriptor {
                name: name.clone(),
                scheme_type: scheme.scheme_type.clone(),
                scheme: scheme.scheme.clone(),
                parameter_name: scheme.name.clone(),
                location: scheme.location.clone(),
                registration,
            }
        })
        .collect()
}
