//! Errors for the concrete external collaborators (spec.md \S6).

use coinjoin_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Every client error is, from the calculators' point of view, just
/// "the collaborator was unavailable" — they fall back rather than
/// inspect the cause (spec.md \S4.3/\S4.4).
impl From<ClientError> for CoreError {
    fn from(err: ClientError) -> Self {
        CoreError::ExternalUnavailable(err.to_string())
    }
}
