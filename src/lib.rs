//! Admin Console
//!
//! Server-side authorization layer for an operations admin console sitting
//! in front of a backend REST API.
//!
//! # Features
//!
//! - **Access Engine**: roles, permissions, ALL/ANY combinators and a
//!   super-admin bypass
//! - **Route Table**: exact and longest-prefix route requirements
//! - **Auth-Failure Guard**: 401 clears state and redirects to
//!   session-expired, 403 redirects to forbidden, everything else comes back
//!   as a structured failure
//! - **Response Caching**: per-token SHA256 keys, revalidated on mutation
//!
//! # Architecture
//!
//! ```text
//! Browser ──► Console Server ──► Backend API
//!                  │
//!                  ├── Sessions (immutable snapshots)
//!                  ├── Access (engine + route table)
//!                  ├── Guard (redirect / structured failure)
//!                  └── Cache (Moka)
//! ```

pub mod access;
pub mod api;
pub mod cache;
pub mod config;
pub mod console;
pub mod guard;
pub mod session;

pub use access::{
    evaluate_component_access, evaluate_route_access, AccessDecision, AccessEngine,
    AccessRequirement, AccessSpec, Combinator, DecisionRule, Principal, RouteRegistry,
};
pub use api::{ApiClient, ApiError, LoginGrant, Profile};
pub use cache::ApiCache;
pub use config::{Config, ConfigError};
pub use console::{ConsoleConfig, ConsoleServer, ConsoleState};
pub use guard::{
    derive_message, ActionResult, AuthGuard, FailureClass, Guarded, Interrupt, Redirect,
    RedirectTargets,
};
pub use session::{Session, SessionStore};
