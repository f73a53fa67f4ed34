//! Core library for the wanauth login client.
//!
//! This crate implements the non-UI half of a mobile login flow against the
//! WanAndroid REST API:
//! - durable per-host session cookie storage that survives restarts
//! - an expiry-aware in-memory cookie table synchronized with that storage
//! - a typed async API client for the login/register endpoints
//! - a coordinator that owns the observable authentication state
//!
//! Presentation layers (screens, navigation) are expected to consume
//! [`AuthState`] snapshots and invoke the coordinator operations; nothing in
//! this crate renders anything.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;

pub use api::{ApiError, AuthApiClient};
pub use auth::{AuthCoordinator, AuthState};
pub use config::Config;
pub use models::{ApiReply, UserProfile};
pub use session::{CredentialStore, SessionCookie, SessionCookieCache};
