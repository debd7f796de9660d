//! Route requirement registry
//!
//! Resolves a request path to its [`AccessRequirement`]: exact match first,
//! then the longest registered prefix. Paths with no registration are public.

use super::{AccessDecision, AccessEngine, AccessRequirement, DecisionRule, Principal};
use std::collections::HashMap;

/// Resources managed through the admin console
pub const ADMIN_RESOURCES: &[&str] = &[
    "accounts",
    "devices",
    "proxies",
    "tasks",
    "transactions",
    "topups",
];

/// Static route-to-requirement table
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    exact: HashMap<String, AccessRequirement>,
    prefixes: Vec<(String, AccessRequirement)>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a requirement for one exact path
    pub fn exact(mut self, path: &str, requirement: AccessRequirement) -> Self {
        self.exact.insert(normalize_path(path), requirement);
        self
    }

    /// Register a requirement for a path and everything below it
    pub fn prefix(mut self, prefix: &str, requirement: AccessRequirement) -> Self {
        let prefix = normalize_path(prefix);
        // Re-registering a prefix replaces it
        self.prefixes.retain(|(p, _)| *p != prefix);
        self.prefixes.push((prefix, requirement));
        self
    }

    /// Registry for the admin console surface
    ///
    /// Each resource gets `<singular>.view` on its subtree and
    /// `<singular>.create` on its `new` form. The RBAC screens need the
    /// `admin` role and `role.manage`.
    pub fn admin_defaults() -> Self {
        let mut registry = Self::new()
            .exact("/", AccessRequirement::public())
            .exact("/login", AccessRequirement::public())
            .exact("/logout", AccessRequirement::public())
            .exact("/forbidden", AccessRequirement::public())
            .prefix("/api/health", AccessRequirement::public())
            .prefix(
                "/rbac",
                AccessRequirement::permissions(["role.manage"]).and_roles(["admin"]),
            )
            .prefix("/api/roles", AccessRequirement::roles(["admin"]));

        for resource in ADMIN_RESOURCES {
            let scope = permission_scope(resource);
            registry = registry
                .prefix(
                    &format!("/{resource}"),
                    AccessRequirement::permissions([format!("{scope}.view")]),
                )
                .exact(
                    &format!("/{resource}/new"),
                    AccessRequirement::permissions([format!("{scope}.create")]),
                )
                .prefix(
                    &format!("/api/{resource}"),
                    AccessRequirement::permissions([format!("{scope}.view")]),
                );
        }

        registry
    }

    /// Find the requirement governing `path`
    pub fn lookup(&self, path: &str) -> Option<&AccessRequirement> {
        let path = normalize_path(path);

        if let Some(requirement) = self.exact.get(&path) {
            return Some(requirement);
        }

        self.prefixes
            .iter()
            .filter(|(prefix, _)| prefix_matches(prefix, &path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, requirement)| requirement)
    }

    /// Decide access to `path`; unregistered paths are public
    pub fn decide(&self, engine: &AccessEngine, principal: &Principal, path: &str) -> AccessDecision {
        match self.lookup(path) {
            Some(requirement) => engine.decide(principal, requirement),
            None if principal.has_role(engine.bypass_role()) => AccessDecision {
                allowed: true,
                rule: DecisionRule::SuperAdminBypass,
            },
            None => AccessDecision {
                allowed: true,
                rule: DecisionRule::Public,
            },
        }
    }

    /// Route-level check with the default bypass role
    pub fn evaluate(&self, principal: &Principal, path: &str) -> bool {
        self.decide(&AccessEngine::default(), principal, path).allowed
    }

    /// Whether `path` carries any restriction at all
    pub fn is_protected(&self, path: &str) -> bool {
        self.lookup(path).is_some_and(|r| !r.is_public())
    }
}

/// Permission namespace for a resource path segment
///
/// `proxies` -> `proxy`, `accounts` -> `account`.
pub fn permission_scope(resource: &str) -> String {
    if let Some(stem) = resource.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = resource.strip_suffix('s') {
        stem.to_string()
    } else {
        resource.to_string()
    }
}

/// Strip query string and trailing slash
fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Prefix match on segment boundaries
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_wins_over_prefix() {
        let registry = RouteRegistry::new()
            .prefix("/devices", AccessRequirement::permissions(["device.view"]))
            .exact("/devices/new", AccessRequirement::permissions(["device.create"]));

        assert_eq!(
            registry.lookup("/devices/new").unwrap().permissions,
            vec!["device.create"]
        );
        assert_eq!(
            registry.lookup("/devices/42").unwrap().permissions,
            vec!["device.view"]
        );
    }

    #[test]
    fn test_longest_prefix_regardless_of_order() {
        let short_first = RouteRegistry::new()
            .prefix("/tasks", AccessRequirement::permissions(["task.view"]))
            .prefix("/tasks/runs", AccessRequirement::permissions(["task.run"]));
        let long_first = RouteRegistry::new()
            .prefix("/tasks/runs", AccessRequirement::permissions(["task.run"]))
            .prefix("/tasks", AccessRequirement::permissions(["task.view"]));

        for registry in [short_first, long_first] {
            assert_eq!(
                registry.lookup("/tasks/runs/7").unwrap().permissions,
                vec!["task.run"]
            );
            assert_eq!(
                registry.lookup("/tasks/7").unwrap().permissions,
                vec!["task.view"]
            );
        }
    }

    #[test]
    fn test_prefix_respects_segments() {
        let registry =
            RouteRegistry::new().prefix("/proxies", AccessRequirement::permissions(["proxy.view"]));

        assert!(registry.lookup("/proxies").is_some());
        assert!(registry.lookup("/proxies/").is_some());
        assert!(registry.lookup("/proxies?page=2").is_some());
        assert!(registry.lookup("/proxies-archive").is_none());
    }

    #[test]
    fn test_unregistered_path_is_public() {
        let registry = RouteRegistry::admin_defaults();
        let decision = registry.decide(&AccessEngine::default(), &Principal::anonymous(), "/about");
        assert!(decision.allowed);
        assert_eq!(decision.rule, DecisionRule::Public);
    }

    #[test]
    fn test_admin_defaults() {
        let registry = RouteRegistry::admin_defaults();
        let viewer = Principal::new(["user"], ["proxy.view"]);

        assert!(registry.evaluate(&viewer, "/proxies"));
        assert!(registry.evaluate(&viewer, "/proxies/12/edit"));
        assert!(!registry.evaluate(&viewer, "/proxies/new"));
        assert!(!registry.evaluate(&viewer, "/devices"));
        assert!(!registry.evaluate(&viewer, "/rbac"));
        assert!(registry.evaluate(&viewer, "/login"));
        assert!(registry.evaluate(&Principal::anonymous(), "/api/health"));
        assert!(registry.is_protected("/topups"));
        assert!(!registry.is_protected("/forbidden"));
    }

    #[test]
    fn test_rbac_needs_role_and_permission() {
        let registry = RouteRegistry::admin_defaults();

        let perm_only = Principal::new(["user"], ["role.manage"]);
        let both = Principal::new(["admin"], ["role.manage"]);
        let root = Principal::new(["super-admin"], Vec::<String>::new());

        assert!(!registry.evaluate(&perm_only, "/rbac/roles"));
        assert!(registry.evaluate(&both, "/rbac/roles"));
        assert!(registry.evaluate(&root, "/rbac/roles"));
    }

    #[test]
    fn test_permission_scope() {
        assert_eq!(permission_scope("proxies"), "proxy");
        assert_eq!(permission_scope("accounts"), "account");
        assert_eq!(permission_scope("topups"), "topup");
        assert_eq!(permission_scope("rbac"), "rbac");
    }
}
