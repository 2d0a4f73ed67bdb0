//! Policy extractors.
//!
//! Each extractor reads one family of vendor extensions through an [`ExtensionScope`] and
//! produces a named configuration. [`PolicySet`] collects the configurations of a whole
//! document, one entry per name, for the DI registration code. Endpoints reference the
//! registered name, which differs from the declared one when two operations declare the
//! same name with different settings.

pub mod cache;
pub mod extensions;
pub mod oauth;
pub mod rate_limit;
pub mod resilience;

pub use cache::{CacheKind, CachePolicy};
pub use extensions::ExtensionScope;
pub use oauth::{OAuthConfig, ScopePolicy};
pub use rate_limit::{RateLimitAlgorithm, RateLimitPolicy};
pub use resilience::{BackoffKind, ResiliencePolicy};

use log::warn;
use serde::Serialize;

/// A configuration registered under a name.
pub trait NamedPolicy: PartialEq {
    fn policy_name(&self) -> &str;
}

/// A policy an endpoint refers to by name, renamed when its declared name is taken.
pub trait RenamablePolicy: NamedPolicy + Clone {
    fn rename(&mut self, name: String);
}

/// Document-wide registrations, deduplicated by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicySet {
    pub rate_limits: Vec<RateLimitPolicy>,
    pub caches: Vec<CachePolicy>,
    pub resilience: Vec<ResiliencePolicy>,
    pub oauth: Vec<OAuthConfig>,
    pub scope_policies: Vec<ScopePolicy>,
}

impl PolicySet {
    /// Registers a rate limiter and returns it under its registered name.
    pub fn add_rate_limit(&mut self, policy: &RateLimitPolicy) -> RateLimitPolicy {
        register_unique(&mut self.rate_limits, policy, "rate limit")
    }

    pub fn add_cache(&mut self, policy: &CachePolicy) -> CachePolicy {
        register_unique(&mut self.caches, policy, "cache")
    }

    pub fn add_resilience(&mut self, policy: &ResiliencePolicy) -> ResiliencePolicy {
        register_unique(&mut self.resilience, policy, "resilience")
    }

    pub fn add_oauth(&mut self, config: &OAuthConfig) {
        add_named(&mut self.oauth, config, "OAuth");
    }

    pub fn add_scope_policy(&mut self, policy: &ScopePolicy) {
        add_named(&mut self.scope_policies, policy, "scope");
    }

    /// Registration snippets in registration order: rate limiters, output cache policies,
    /// resilience pipelines, then scope policies.
    pub fn registrations(&self) -> Vec<String> {
        let mut snippets: Vec<String> = self.rate_limits.iter().map(RateLimitPolicy::registration).collect();
        snippets.extend(self.caches.iter().filter_map(CachePolicy::registration));
        snippets.extend(self.resilience.iter().map(ResiliencePolicy::registration));
        snippets.extend(self.scope_policies.iter().map(ScopePolicy::registration));
        snippets
    }
}

/// Registers `policy` under its declared name, or under the first free `{name}{n}` when
/// that name already holds a different definition. Identical definitions share one entry.
fn register_unique<T: RenamablePolicy>(list: &mut Vec<T>, policy: &T, family: &str) -> T {
    let declared = policy.policy_name().to_string();
    let mut candidate = policy.clone();
    let mut suffix = 2;
    loop {
        match list.iter().find(|p| p.policy_name() == candidate.policy_name()) {
            None => {
                if candidate.policy_name() != declared {
                    warn!(
                        "Conflicting {} policy '{}', registered as '{}'",
                        family,
                        declared,
                        candidate.policy_name()
                    );
                }
                list.push(candidate.clone());
                return candidate;
            }
            Some(existing) if *existing == candidate => return candidate,
            Some(_) => {
                candidate.rename(format!("{}{}", declared, suffix));
                suffix += 1;
            }
        }
    }
}

/// First definition of a name wins; a different definition under the same name is dropped.
fn add_named<T: NamedPolicy + Clone>(list: &mut Vec<T>, policy: &T, family: &str) {
    match list.iter().find(|p| p.policy_name() == policy.policy_name()) {
        Some(existing) if existing != policy => warn!(
            "Conflicting {} policy '{}', keeping the first definition",
            family,
            policy.policy_name()
        ),
        Some(_) => {}
        None => list.push(policy.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_policies_share_a_name() {
        let mut set = PolicySet::default();
        let burst = RateLimitPolicy::named("Burst");

        assert_eq!(set.add_rate_limit(&burst).name, "Burst");
        assert_eq!(set.add_rate_limit(&burst).name, "Burst");
        set.add_rate_limit(&RateLimitPolicy::named("Strict"));

        assert_eq!(set.rate_limits.len(), 2);
        assert_eq!(set.registrations().len(), 2);
    }

    #[test]
    fn test_conflicting_definitions_get_distinct_names() {
        let mut set = PolicySet::default();
        let burst = RateLimitPolicy::named("Burst");
        let mut tight = RateLimitPolicy::named("Burst");
        tight.permit_limit = 1;

        set.add_rate_limit(&burst);
        let registered = set.add_rate_limit(&tight);
        assert_eq!(registered.name, "Burst2");
        assert_eq!(registered.permit_limit, 1);
        assert_eq!(set.add_rate_limit(&tight).name, "Burst2");

        let names: Vec<&str> = set.rate_limits.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Burst", "Burst2"]);
        assert_eq!(set.rate_limits[0].permit_limit, 100);
        assert!(set.registrations()[1].contains("\"Burst2\""));
    }
}
