//! User profile and response envelope types.
//!
//! The API wraps every body in `{data, errorCode, errorMsg}` where
//! `errorCode == 0` signals success. The profile is returned on successful
//! login/registration and is never persisted by this crate; session identity
//! is cookie-based.

use serde::Deserialize;

/// Profile returned by the API on successful login or registration.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "icon", default)]
    pub icon_url: String,
    #[serde(rename = "type", default)]
    pub account_type: i32,
    #[serde(rename = "collectIds", default)]
    pub collect_ids: Vec<i64>,
}

/// Standard response envelope for all API endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiReply<T> {
    pub data: Option<T>,
    #[serde(rename = "errorCode")]
    pub error_code: i32,
    #[serde(rename = "errorMsg", default)]
    pub error_msg: String,
}

impl<T> ApiReply<T> {
    /// Server-reported success: `errorCode == 0`.
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }
}
