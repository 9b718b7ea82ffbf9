use super::transport::Method;

/// Failure of a single call to the Jira REST API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
  #[error("invalid Jira URL {url}: {source}")]
  InvalidUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("{method} {endpoint} failed: {source}")]
  Request {
    method: Method,
    endpoint: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{method} {endpoint} returned HTTP {status}: {body}")]
  Status {
    method: Method,
    endpoint: String,
    status: u16,
    body: String,
  },

  #[error("{method} {endpoint} returned invalid JSON: {source}")]
  Decode {
    method: Method,
    endpoint: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Errors surfaced by the Jira clients.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
  /// No credentials have been set; nothing was sent.
  #[error("Jira credentials not set")]
  NotConfigured,

  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error("no Jira user matches {0}")]
  UserNotFound(String),

  #[error("unexpected response from {endpoint}: {reason}")]
  UnexpectedResponse { endpoint: String, reason: String },
}
