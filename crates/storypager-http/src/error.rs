//! Error types for listing fetches

use thiserror::Error;

/// Outcome classes of a failed listing fetch.
///
/// None of these are cached: the offset stays fetchable after any of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The header provider failed; no request was sent.
    #[error("failed to resolve request headers: {0}")]
    AuthResolution(String),

    /// The endpoint answered 401 for this view.
    #[error("listing requires authentication (HTTP 401)")]
    Unauthorized,

    /// Any other non-2xx status.
    #[error("listing request failed with HTTP {status}")]
    Http { status: u16 },

    /// Network failure or an unreadable response body.
    #[error("listing transport failure: {0}")]
    Transport(String),
}

impl FetchError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthResolution(_) => "AuthResolution",
            Self::Unauthorized => "Unauthorized",
            Self::Http { .. } => "HttpError",
            Self::Transport(_) => "TransportError",
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Rejected gate configuration.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid listing endpoint '{endpoint}': {source}")]
    Invalid {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("listing endpoint '{0}' must use http or https")]
    UnsupportedScheme(String),
}
