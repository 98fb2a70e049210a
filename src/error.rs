#[derive(Debug, thiserror::Error)]
pub enum HyperopticError {
    /// Both login strategies were exhausted, or the PKCE flow could not
    /// locate a login form or authorization code. Usually means the
    /// credentials are wrong or the realm's flow shape changed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A resource request came back with status >= 400 after the single
    /// 401 retry was spent.
    #[error("API request to {url} failed with status {status}: {message}")]
    Api {
        status: u16,
        message: String,
        url: String,
    },

    /// Network-level failure from the underlying HTTP stack.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HyperopticError {
    /// HTTP status carried by an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HyperopticError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
