//! Request/response types and the network capability used on cache misses
//! and during install.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::RequestKey;
use crate::error::{Error, Result};

/// An outgoing request as seen by the interceptor. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: String,
  pub url: String,
  pub headers: Vec<(String, String)>,
}

impl Request {
  pub fn new(method: &str, url: impl Into<String>) -> Self {
    Self {
      method: method.to_ascii_uppercase(),
      url: url.into(),
      headers: Vec::new(),
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new("GET", url)
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Resolve a possibly relative URL against the application origin.
  ///
  /// Absolute URLs (e.g. a CDN stylesheet) are kept as they are.
  pub fn resolve(&self, origin: &Url) -> std::result::Result<Request, url::ParseError> {
    let absolute = origin.join(&self.url)?;
    Ok(Request {
      method: self.method.clone(),
      url: absolute.to_string(),
      headers: self.headers.clone(),
    })
  }

  /// Identity used for cache lookups.
  pub fn key(&self) -> RequestKey {
    RequestKey::new(&self.method, &self.url)
  }
}

/// A captured response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Network capability.
///
/// Implementations return [`Error::NetworkFailure`] when no response could be
/// obtained. HTTP error statuses are responses, not failures.
#[async_trait]
pub trait Network: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Network backed by reqwest.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
}

impl HttpNetwork {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("movie-offline/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| Error::NetworkFailure {
        url: String::new(),
        reason: format!("failed to build HTTP client: {}", e),
      })?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let failure = |reason: String| Error::NetworkFailure {
      url: request.url.clone(),
      reason,
    };

    let method = reqwest::Method::from_bytes(request.method.as_bytes())
      .map_err(|e| failure(format!("invalid method {}: {}", request.method, e)))?;
    let url = Url::parse(&request.url).map_err(|e| failure(e.to_string()))?;

    let mut builder = self.client.request(method, url);
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder.send().await.map_err(|e| failure(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| failure(format!("failed to read body: {}", e)))?
      .to_vec();

    Ok(Response {
      status,
      headers,
      body,
    })
  }
}
