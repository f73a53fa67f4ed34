//! Data models for the WanAndroid API.

pub mod user;

pub use user::{ApiReply, UserProfile};
