//! Authenticated HTTP access to the Jira REST API.
//!
//! The clients never talk to the network directly; every request goes through
//! a [`Transport`], which makes them testable with an in-process fake.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::TransportError;
use super::types::Credentials;

/// Path prefix of the Jira Cloud REST API.
const API_PREFIX: &str = "/rest/api/3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Method::Get => "GET",
      Method::Post => "POST",
    };
    f.write_str(name)
  }
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
    }
  }
}

/// Single entry point for remote calls.
///
/// `endpoint` is relative to the REST API root and may carry a query string,
/// e.g. `/issue/PROJ-1/worklog?startAt=0`. An empty response body yields
/// `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn call(
    &self,
    credentials: &Credentials,
    endpoint: &str,
    method: Method,
    body: Option<&Value>,
  ) -> Result<Value, TransportError>;
}

/// Transport over HTTPS using Basic auth (email + API token).
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("jlog/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }

  fn url(credentials: &Credentials, endpoint: &str) -> Result<Url, TransportError> {
    let url = format!("{}{}{}", credentials.base_url(), API_PREFIX, endpoint);
    Url::parse(&url).map_err(|source| TransportError::InvalidUrl { url, source })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn call(
    &self,
    credentials: &Credentials,
    endpoint: &str,
    method: Method,
    body: Option<&Value>,
  ) -> Result<Value, TransportError> {
    let url = Self::url(credentials, endpoint)?;
    debug!(%method, endpoint, "calling Jira");

    let mut request = self
      .client
      .request(method.into(), url)
      .basic_auth(&credentials.email, Some(&credentials.api_token))
      .header(ACCEPT, "application/json");

    if let Some(body) = body {
      let bytes = serde_json::to_vec(body).map_err(|source| TransportError::Decode {
        method,
        endpoint: endpoint.to_string(),
        source,
      })?;
      request = request.header(CONTENT_TYPE, "application/json").body(bytes);
    }

    let request_error = |source| TransportError::Request {
      method,
      endpoint: endpoint.to_string(),
      source,
    };

    let response = request.send().await.map_err(request_error)?;
    let status = response.status();
    let bytes = response.bytes().await.map_err(request_error)?;

    if !status.is_success() {
      return Err(TransportError::Status {
        method,
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: String::from_utf8_lossy(&bytes).chars().take(500).collect(),
      });
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
      return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes).map_err(|source| TransportError::Decode {
      method,
      endpoint: endpoint.to_string(),
      source,
    })
  }
}
