//! REST API client module for the WanAndroid authentication endpoints.
//!
//! The API uses form-encoded POST requests and cookie-based sessions: the
//! client attaches stored cookies to every request and records every
//! `Set-Cookie` it receives, success or failure, since the server may rotate
//! session cookies even on rejected auth attempts.

pub mod client;
pub mod error;

pub use client::AuthApiClient;
pub use error::ApiError;
