use reqwest::StatusCode;

/// API statuses that may succeed if the same request is sent again.
const TRANSIENT_API_STATUSES: &[&str] = &["OVER_QUERY_LIMIT", "UNKNOWN_ERROR"];

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {}", .message.as_deref().unwrap_or("no error message"))]
    Api {
        status: String,
        message: Option<String>,
    },

    #[error("Maximum API calls ({max}) reached")]
    BudgetExhausted { max: usize },

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: usize,
        last: Box<ClientError>,
    },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether sending the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS
                    })
            }
            ClientError::Api { status, .. } => TRANSIENT_API_STATUSES.contains(&status.as_str()),
            _ => false,
        }
    }

    /// Google reports malformed or expired queries (such as a stale page
    /// token) as `INVALID_REQUEST`.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if status == "INVALID_REQUEST")
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
