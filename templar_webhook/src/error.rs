use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph API error ({status}): {body}")]
    Graph { status: u16, body: String },

    #[error("X API error ({status}): {body}")]
    X { status: u16, body: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Worth another attempt: transport failures, throttling and server errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Graph { status, .. } | Self::X { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::Config(_) | Self::Io(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(status: u16) -> Error {
        Error::Graph {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn only_throttling_and_server_errors_are_transient() {
        assert!(graph(500).is_transient());
        assert!(graph(503).is_transient());
        assert!(graph(429).is_transient());
        assert!(!graph(400).is_transient());
        assert!(!graph(401).is_transient());
        assert!(!graph(404).is_transient());
        assert!(
            Error::X {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !Error::X {
                status: 403,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!Error::InvalidResponse("missing id".to_string()).is_transient());
    }
}
