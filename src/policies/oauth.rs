use super::NamedPolicy;
use crate::document::{Document, OAuthFlow, SecurityScheme};
use crate::snippets;
use log::debug;
use serde::Serialize;

const WELL_KNOWN_SUFFIX: &str = "/.well-known/openid-configuration";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OAuthFlowDescriptor {
    /// `authorizationCode`, `clientCredentials`, `implicit` or `password`
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    pub scopes: Vec<String>,
}

/// Token validation settings for an `oauth2` or `openIdConnect` scheme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OAuthConfig {
    pub scheme_name: String,
    pub scheme_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub use_pkce: bool,
    pub flows: Vec<OAuthFlowDescriptor>,
}

impl OAuthConfig {
    /// Every scope declared by any flow, deduplicated in declaration order.
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = Vec::new();
        for scope in self.flows.iter().flat_map(|f| &f.scopes) {
            if !scopes.contains(scope) {
                scopes.push(scope.clone());
            }
        }
        scopes
    }

    pub fn registration(&self) -> String {
        snippets::jwt_bearer_registration(self)
    }
}

impl NamedPolicy for OAuthConfig {
    fn policy_name(&self) -> &str {
        &self.scheme_name
    }
}

/// An authorization policy requiring one OAuth scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopePolicy {
    pub name: String,
    pub scope: String,
}

impl ScopePolicy {
    pub fn registration(&self) -> String {
        snippets::scope_policy_registration(self)
    }
}

impl NamedPolicy for ScopePolicy {
    fn policy_name(&self) -> &str {
        &self.name
    }
}

/// Builds the OAuth configuration of a scheme, or `None` for other scheme types.
pub fn oauth_config(scheme_name: &str, scheme: &SecurityScheme) -> Option<OAuthConfig> {
    let scheme_type = scheme.scheme_type.as_str();
    if scheme_type != "oauth2" && scheme_type != "openIdConnect" {
        return None;
    }

    let mut flows = Vec::new();
    if let Some(declared) = &scheme.flows {
        let slots = [
            ("authorizationCode", &declared.authorization_code),
            ("clientCredentials", &declared.client_credentials),
            ("implicit", &declared.implicit),
            ("password", &declared.password),
        ];
        for (kind, flow) in slots {
            if let Some(flow) = flow {
                flows.push(flow_descriptor(kind, flow));
            }
        }
    }

    let extension = |key: &str| {
        scheme
            .extensions
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    };

    let authority = extension("x-authority").or_else(|| {
        scheme
            .open_id_connect_url
            .as_deref()
            .map(|url| url.trim_end_matches(WELL_KNOWN_SUFFIX).to_string())
    });
    let use_pkce = scheme
        .extensions
        .get("x-pkce")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or_else(|| flows.iter().any(|f| f.kind == "authorizationCode"));

    debug!("OAuth scheme {} with {} flows", scheme_name, flows.len());
    Some(OAuthConfig {
        scheme_name: scheme_name.to_string(),
        scheme_type: scheme_type.to_string(),
        authority,
        audience: extension("x-audience"),
        client_id: extension("x-client-id"),
        use_pkce,
        flows,
    })
}

fn flow_descriptor(kind: &str, flow: &OAuthFlow) -> OAuthFlowDescriptor {
    OAuthFlowDescriptor {
        kind: kind.to_string(),
        authorization_url: flow.authorization_url.clone(),
        token_url: flow.token_url.clone(),
        refresh_url: flow.refresh_url.clone(),
        scopes: flow.scopes.keys().cloned().collect(),
    }
}

/// OAuth configurations of every scheme in the document.
pub fn extract_oauth(document: &Document) -> Vec<OAuthConfig> {
    document
        .components
        .security_schemes
        .iter()
        .filter_map(|(name, scheme)| oauth_config(name, scheme))
        .collect()
}

/// One policy per declared scope, named after the scope itself.
pub fn scope_policies(configs: &[OAuthConfig]) -> Vec<ScopePolicy> {
    let mut policies: Vec<ScopePolicy> = Vec::new();
    for scope in configs.iter().flat_map(OAuthConfig::scopes) {
        if !policies.iter().any(|p| p.scope == scope) {
            policies.push(ScopePolicy {
                name: scope.clone(),
                scope,
            });
        }
    }
    policies
}
