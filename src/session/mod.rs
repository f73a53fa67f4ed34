//! Session persistence for authentication cookies.
//!
//! This module provides:
//! - `CredentialStore`: durable host -> {"name=value"} storage on disk
//! - `SessionCookieCache`: the expiry-aware in-memory cookie table that
//!   stays reconciled with the store after every mutation
//!
//! Presence of any valid stored cookie is what the rest of the crate treats
//! as "logged in"; there is no separate token.

pub mod cookies;
pub mod store;

pub use cookies::{SessionCookie, SessionCookieCache};
pub use store::CredentialStore;
