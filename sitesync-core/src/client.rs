use std::collections::HashMap;
use std::fmt;

use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::paths::normalize_remote_path;

const LIST_FILES_PATH: &str = "/api/rest/files";

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("not logged in: no session cookie available")]
    NotAuthenticated,
    #[error("invalid remote path: {0:?}")]
    InvalidPath(String),
}

/// Outcome of a PUT that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutStatus {
    Stored,
    Throttled,
}

/// HTTP client for one site, carrying the session cookie obtained at login.
#[derive(Clone)]
pub struct SiteClient {
    http: Client,
    base_url: Url,
    cookie: String,
}

impl fmt::Debug for SiteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteClient")
            .field("base_url", &self.base_url.as_str())
            .field("cookie", &"<redacted>")
            .finish()
    }
}

impl SiteClient {
    /// Fails with [`SiteError::NotAuthenticated`] when no usable cookie is given.
    pub fn new(base_url: &str, cookie: Option<&str>) -> Result<Self, SiteError> {
        let cookie = cookie
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(SiteError::NotAuthenticated)?;
        Self::with_http(Client::new(), base_url, cookie)
    }

    pub fn with_http(
        http: Client,
        base_url: &str,
        cookie: impl Into<String>,
    ) -> Result<Self, SiteError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            cookie: cookie.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Maps a path relative to the site root to the absolute URL of the object.
    pub fn object_url(&self, remote_path: &str) -> Result<Url, SiteError> {
        let normalized = normalize_remote_path(remote_path)?;
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SiteError::InvalidPath(self.base_url.to_string()))?;
            segments.clear();
            for segment in normalized.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    /// Fetches one page of the remote file listing. An empty
    /// `continuation_token` requests the first page.
    pub async fn list_files(
        &self,
        continuation_token: &str,
        max_files: u32,
    ) -> Result<FileListing, SiteError> {
        let mut url = self.endpoint(LIST_FILES_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("max_files", &max_files.max(1).to_string());
            if !continuation_token.is_empty() {
                query.append_pair("continuation_token", continuation_token);
            }
        }
        let response = self
            .http
            .get(url)
            .header(COOKIE, self.cookie.as_str())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn put_object(
        &self,
        url: &Url,
        body: Body,
        content_type: &str,
        content_length: u64,
        cache_control: &str,
    ) -> Result<PutStatus, SiteError> {
        let response = self
            .http
            .put(url.clone())
            .header(COOKIE, self.cookie.as_str())
            .header(CONTENT_TYPE, content_type)
            .header(CACHE_CONTROL, cache_control)
            .header(CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(PutStatus::Stored),
            StatusCode::TOO_MANY_REQUESTS => Ok(PutStatus::Throttled),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SiteError::Api { status, body })
            }
        }
    }

    pub async fn delete_object(&self, url: &Url) -> Result<(), SiteError> {
        let response = self
            .http
            .delete(url.clone())
            .header(COOKIE, self.cookie.as_str())
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SiteError::Api { status, body })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SiteError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SiteError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SiteError::Api { status, body })
        }
    }
}

impl SiteError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SiteError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FileListing {
    #[serde(default)]
    pub files: HashMap<String, RemoteFile>,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

impl FileListing {
    /// Token for the next page, or `None` once the listing is exhausted.
    pub fn continuation(&self) -> Option<&str> {
        self.next_continuation_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RemoteFile {
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cookie_is_not_authenticated() {
        assert!(matches!(
            SiteClient::new("https://example.site/", None),
            Err(SiteError::NotAuthenticated)
        ));
        assert!(matches!(
            SiteClient::new("https://example.site/", Some("  ")),
            Err(SiteError::NotAuthenticated)
        ));
    }

    #[test]
    fn object_url_replaces_base_path() {
        let client = SiteClient::new("https://example.site/admin?x=1", Some("sid=1")).unwrap();
        assert_eq!(
            client.object_url("/css/main.css").unwrap().as_str(),
            "https://example.site/css/main.css"
        );
        assert_eq!(client.object_url(".").unwrap().as_str(), "https://example.site/");
    }

    #[test]
    fn debug_output_hides_cookie() {
        let client = SiteClient::new("https://example.site/", Some("session=secret")).unwrap();
        let shown = format!("{client:?}");
        assert!(shown.contains("https://example.site/"));
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn status_is_exposed_for_api_errors_only() {
        let err = SiteError::Api {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(SiteError::NotAuthenticated.status(), None);
    }

    #[test]
    fn empty_continuation_token_ends_listing() {
        let listing = FileListing {
            files: HashMap::new(),
            next_continuation_token: Some(String::new()),
        };
        assert_eq!(listing.continuation(), None);
    }
}
