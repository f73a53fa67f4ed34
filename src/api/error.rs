use thiserror::Error;

/// Transport-level failures from the API client.
///
/// Server-reported rejections (`errorCode != 0`) are not errors at this
/// layer; they arrive inside a decoded [`crate::ApiReply`]. These variants
/// cover the cases where no usable envelope came back at all.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}
