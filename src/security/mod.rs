//! Caller identity

pub mod identity;

pub use identity::{Claims, IdentityProvider, JwtIdentityProvider};
