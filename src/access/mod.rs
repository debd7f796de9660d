//! Access Decision Engine
//!
//! Pure evaluation of whether a [`Principal`] satisfies an [`AccessRequirement`].
//!
//! # Rules
//!
//! Evaluated in this order, first match wins:
//!
//! 1. **Bypass**: a principal holding the super-admin role is always allowed
//! 2. **Public**: a requirement with no roles and no permissions is always allowed
//! 3. **Role gate**: required roles must be satisfied (ALL or ANY), otherwise deny
//! 4. **Permission gate**: required permissions must be satisfied (ALL or ANY)
//!
//! Role and permission gates are ANDed when both are present. Each gate uses
//! the requirement's combinator on its own list.
//!
//! ```text
//! Principal ──► bypass? ──► public? ──► role gate ──► permission gate ──► decision
//! ```

pub mod routes;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use routes::RouteRegistry;

/// Role that bypasses every other rule
pub const SUPER_ADMIN_ROLE: &str = "super-admin";

/// The authenticated actor's role/permission snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    pub fn new<R, P>(roles: R, permissions: P) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Principal with no roles and no permissions
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<I>(mut self, permissions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Check for the default bypass role
    pub fn is_super_admin(&self) -> bool {
        self.has_role(SUPER_ADMIN_ROLE)
    }
}

/// How a list of required items is combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every listed item is required
    All,
    /// At least one listed item is required
    #[default]
    Any,
}

impl Combinator {
    pub fn from_require_all(require_all: bool) -> Self {
        if require_all {
            Self::All
        } else {
            Self::Any
        }
    }

    /// Apply this combinator to `required` against the `held` set
    fn satisfied(self, required: &[String], held: &BTreeSet<String>) -> bool {
        match self {
            Combinator::All => required.iter().all(|item| held.contains(item)),
            Combinator::Any => required.iter().any(|item| held.contains(item)),
        }
    }
}

/// What a protected route or component demands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub combinator: Combinator,
}

impl AccessRequirement {
    /// Requirement that is always satisfied
    pub fn public() -> Self {
        Self::default()
    }

    pub fn permissions<I>(permissions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn roles<I>(roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add required roles to a permission requirement
    pub fn and_roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn require_all(mut self) -> Self {
        self.combinator = Combinator::All;
        self
    }

    pub fn is_public(&self) -> bool {
        self.roles.is_empty() && self.permissions.is_empty()
    }
}

/// Which rule produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    SuperAdminBypass,
    Public,
    RoleMatch,
    PermissionMatch,
    RoleDenied,
    PermissionDenied,
}

/// Result of evaluating a principal against a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub rule: DecisionRule,
}

impl AccessDecision {
    fn allow(rule: DecisionRule) -> Self {
        Self { allowed: true, rule }
    }

    fn deny(rule: DecisionRule) -> Self {
        Self {
            allowed: false,
            rule,
        }
    }
}

/// Ad-hoc permission or role spec used by UI fragments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AccessSpec {
    #[default]
    None,
    Single(String),
    List(Vec<String>, Combinator),
}

impl AccessSpec {
    pub fn single(item: impl Into<String>) -> Self {
        Self::Single(item.into())
    }

    pub fn any<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect(), Combinator::Any)
    }

    pub fn all<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect(), Combinator::All)
    }

    /// Flatten into an item list plus the combinator it carries
    pub fn normalize(&self) -> (Vec<String>, Combinator) {
        match self {
            AccessSpec::None => (Vec::new(), Combinator::Any),
            AccessSpec::Single(item) => (vec![item.clone()], Combinator::Any),
            AccessSpec::List(items, combinator) => (items.clone(), *combinator),
        }
    }
}

/// Decision engine parameterised by the bypass role
#[derive(Debug, Clone)]
pub struct AccessEngine {
    bypass_role: String,
}

impl Default for AccessEngine {
    fn default() -> Self {
        Self::new(SUPER_ADMIN_ROLE)
    }
}

impl AccessEngine {
    pub fn new(bypass_role: impl Into<String>) -> Self {
        Self {
            bypass_role: bypass_role.into(),
        }
    }

    pub fn bypass_role(&self) -> &str {
        &self.bypass_role
    }

    /// Evaluate a principal against a requirement
    pub fn decide(&self, principal: &Principal, requirement: &AccessRequirement) -> AccessDecision {
        if principal.has_role(&self.bypass_role) {
            return AccessDecision::allow(DecisionRule::SuperAdminBypass);
        }

        if requirement.is_public() {
            return AccessDecision::allow(DecisionRule::Public);
        }

        let combinator = requirement.combinator;

        // Roles are a necessary gate, not another ANY-term
        if !requirement.roles.is_empty()
            && !combinator.satisfied(&requirement.roles, &principal.roles)
        {
            return AccessDecision::deny(DecisionRule::RoleDenied);
        }

        if requirement.permissions.is_empty() {
            return AccessDecision::allow(DecisionRule::RoleMatch);
        }

        if combinator.satisfied(&requirement.permissions, &principal.permissions) {
            AccessDecision::allow(DecisionRule::PermissionMatch)
        } else {
            AccessDecision::deny(DecisionRule::PermissionDenied)
        }
    }

    /// Component-level check built from ad-hoc specs
    ///
    /// `require_all` forces ALL semantics on both specs; otherwise each spec
    /// keeps its own combinator.
    pub fn decide_component(
        &self,
        principal: &Principal,
        permission_spec: &AccessSpec,
        role_spec: &AccessSpec,
        require_all: bool,
    ) -> AccessDecision {
        let (permissions, perm_combinator) = permission_spec.normalize();
        let (roles, role_combinator) = role_spec.normalize();

        let role_requirement = AccessRequirement {
            roles,
            permissions: Vec::new(),
            combinator: if require_all {
                Combinator::All
            } else {
                role_combinator
            },
        };
        let perm_requirement = AccessRequirement {
            roles: Vec::new(),
            permissions,
            combinator: if require_all {
                Combinator::All
            } else {
                perm_combinator
            },
        };

        if role_requirement.is_public() {
            return self.decide(principal, &perm_requirement);
        }

        let role_decision = self.decide(principal, &role_requirement);
        if !role_decision.allowed || perm_requirement.is_public() {
            return role_decision;
        }

        self.decide(principal, &perm_requirement)
    }
}

/// Route-level check with the default bypass role
pub fn evaluate_route_access(principal: &Principal, requirement: &AccessRequirement) -> bool {
    AccessEngine::default().decide(principal, requirement).allowed
}

/// Component-level check with the default bypass role
pub fn evaluate_component_access(
    principal: &Principal,
    permission_spec: &AccessSpec,
    role_spec: &AccessSpec,
    require_all: bool,
) -> bool {
    AccessEngine::default()
        .decide_component(principal, permission_spec, role_spec, require_all)
        .allowed
}
