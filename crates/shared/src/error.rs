use thiserror::Error;

/// Fault surfaced by a control event stream instead of an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamFault {
    #[error("malformed control event: {0}")]
    Malformed(String),
    #[error("control event stream lagged and dropped {0} events")]
    Lagged(u64),
    #[error("control detached while being observed")]
    Detached,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid lookup base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("lookup request failed: {0}")]
    Transport(String),
    #[error("lookup returned http status {0}")]
    Status(u16),
    #[error("failed to decode lookup response: {0}")]
    Decode(String),
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status(404))
    }
}
