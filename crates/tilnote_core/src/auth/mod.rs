//! Credential hashing, session tokens and role guards.
//!
//! # Invariants
//! - A token is either valid-and-unexpired, or rejected as `Unauthenticated`;
//!   callers cannot tell an expired token from a forged one.
//! - Role checks are literal equality. An `ADMIN` token does not satisfy a
//!   `USER` guard.

pub mod credentials;
pub mod token;

pub use credentials::CredentialStore;
pub use token::{require_role, Claims, CurrentUser, Role, TokenService, TOKEN_TYPE};
