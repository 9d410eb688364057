use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The login page carries no recognizable `csrf-token` meta tag
    #[error("Could not find CSRF token on the login page, is the page changed?")]
    AuthTokenNotFound,

    #[error("Request to {url} failed with status {status}")]
    Fetch {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Not logged in: call `login` before fetching pages")]
    NotAuthenticated,

    #[error("Too many redirects while fetching {0}")]
    TooManyRedirects(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn fetch(url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Error::Fetch {
            url: url.into(),
            status,
        }
    }

    /// Whether the error came from the remote site answering with an error status.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
