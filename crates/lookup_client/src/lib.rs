//! People lookup used by async form validators.
//!
//! Thin HTTP calls: no retry and no caching. The existence check folds every
//! failure into `false`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{error::LookupError, protocol::PersonRecord};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://swapi.dev/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Answers whether an identifier is already in use.
#[async_trait]
pub trait ExistenceCheck: Send + Sync {
    async fn exists(&self, id: &str) -> bool;
}

pub struct PeopleDirectory {
    http: Client,
    base_url: Url,
}

impl PeopleDirectory {
    pub fn new(base_url: &str) -> Result<Self, LookupError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LookupError::Transport(err.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `true` for any successful response, `false` for everything else.
    pub async fn user_id_exists(&self, id: &str) -> bool {
        match self.fetch(id).await {
            Ok(_) => true,
            Err(err) => {
                debug!(id, error = %err, "people lookup failed; treating id as unused");
                false
            }
        }
    }

    pub async fn search_user_by_id(&self, id: &str) -> Result<PersonRecord, LookupError> {
        let response = self.fetch(id).await?;
        response
            .json::<PersonRecord>()
            .await
            .map_err(|err| LookupError::Decode(err.to_string()))
    }

    fn person_url(&self, id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("people").push(id);
        }
        url
    }

    async fn fetch(&self, id: &str) -> Result<Response, LookupError> {
        let url = self.person_url(id);
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| LookupError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            if status.is_server_error() {
                warn!(%url, status = status.as_u16(), "people lookup server error");
            }
            return Err(LookupError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl ExistenceCheck for PeopleDirectory {
    async fn exists(&self, id: &str) -> bool {
        self.user_id_exists(id).await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, LookupError> {
    let invalid = |reason: String| LookupError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("url cannot carry a path".into()));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
