use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use regex::Regex;
use reqwest::{
    RequestBuilder, Response, StatusCode,
    header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, LOCATION, ORIGIN, REFERER},
    redirect,
};
use tokio::sync::RwLock;
use url::Url;

use crate::{
    account::Account,
    cookie::CookieJar,
    error::{Error, Result},
    utils::{DEFAULT_USER_AGENT, HTML_ACCEPT, default_header},
};

pub const DEFAULT_BASE_URL: &str = "https://www.gradescope.com";

/// Text only present on the login form; seeing it after login means the
/// credentials were rejected.
const LOGIN_PAGE_MARKER: &str = "Log in with your Gradescope account";

const MAX_REDIRECTS: usize = 10;

static CSRF_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<meta name="csrf-token" content="([^"]+)""#).unwrap());

/// Authenticated GET access to the site's pages.
pub trait Fetch: Sync {
    fn get_html(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Default, Clone)]
pub struct SessionState {
    pub cookies: CookieJar,
    pub authenticated: bool,
}

/// A browser-like session on the site.
///
/// Cookies from every response, redirects included, are collected in one jar and
/// sent with every following request. Pages behind the login are only fetched
/// once [`GsConnection::login`] has succeeded. Clones share the session.
#[derive(Debug, Clone)]
pub struct GsConnection {
    client: reqwest::Client,
    base_url: Url,
    state: Arc<RwLock<SessionState>>,
}

#[derive(Debug, Default)]
pub struct GsConnectionBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl GsConnectionBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn build(self) -> Result<GsConnection> {
        let base_url = Url::parse(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let mut client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .default_headers(default_header())
            // Redirects are followed by hand so each hop's cookies are kept.
            .redirect(redirect::Policy::none());
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }
        Ok(GsConnection {
            client: client.build()?,
            base_url,
            state: Arc::new(RwLock::new(SessionState::default())),
        })
    }
}

impl GsConnection {
    /// Connection to the default site with default client settings.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> GsConnectionBuilder {
        GsConnectionBuilder::default()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `Cookie` header value of the session, in the order cookies were first set.
    pub async fn cookies(&self) -> String {
        self.state.read().await.cookies.header_value()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.authenticated
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Pages of the logged-in account, or `None` before a successful login.
    pub async fn account(&self) -> Option<Account<'_, Self>> {
        self.is_authenticated()
            .await
            .then(|| Account::new(self))
    }

    /// Reads the CSRF token embedded in the login page.
    pub async fn fetch_token(&self) -> Result<String> {
        let body = self.get_following(self.url("/login")?).await?.text().await?;
        CSRF_TOKEN
            .captures(&body)
            .map(|captures| captures[1].to_string())
            .ok_or(Error::AuthTokenNotFound)
    }

    /// Submits the login form.
    ///
    /// Returns `Ok(false)` when the site rejects the credentials, that is when it
    /// does not answer with a redirect or redirects back to the login form.
    #[tracing::instrument(level = tracing::Level::DEBUG, skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<bool> {
        tracing::info!("Starting login process");
        let token = self.fetch_token().await?;
        tracing::debug!("Got auth token");

        let login_url = self.url("/login")?;
        let params = [
            ("utf8", "✓"),
            ("authenticity_token", token.as_str()),
            ("session[email]", email),
            ("session[password]", password),
            ("session[remember_me]", "0"),
            ("commit", "Log In"),
            ("session[remember_me_sso]", "0"),
        ];
        let response = self
            .send(
                self.client
                    .post(login_url.clone())
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(ACCEPT, HTML_ACCEPT)
                    .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
                    .header(ORIGIN, self.base_url.origin().ascii_serialization())
                    .header(REFERER, login_url.as_str())
                    .form(&params),
            )
            .await?;
        tracing::debug!("Login response status: {}", response.status());

        if response.status() != StatusCode::FOUND {
            tracing::warn!("Login failed: expected a redirect, got {}", response.status());
            return Ok(false);
        }
        let Some(location) = location(&response) else {
            tracing::warn!("Login failed: redirect without location");
            return Ok(false);
        };
        let target = login_url.join(location)?;
        tracing::debug!("Following login redirect to {target}");

        let landing = self.get_following(target).await?;
        let status = landing.status();
        let body = landing.text().await?;
        if body.contains(LOGIN_PAGE_MARKER) {
            tracing::warn!("Login failed: redirected back to the login page");
            return Ok(false);
        }
        if status != StatusCode::OK {
            tracing::warn!("Login failed: landing page answered {status}");
            return Ok(false);
        }

        self.state.write().await.authenticated = true;
        tracing::info!("Login successful");
        Ok(true)
    }

    /// GETs a page of the logged-in session. `url` may be relative to the base URL.
    #[tracing::instrument(level = tracing::Level::DEBUG, skip(self))]
    pub async fn get_html(&self, url: &str) -> Result<String> {
        if !self.is_authenticated().await {
            return Err(Error::NotAuthenticated);
        }
        let url = self.base_url.join(url)?;
        let response = self.get_following(url.clone()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, status));
        }
        Ok(response.text().await?)
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_following(&self, mut url: Url) -> Result<Response> {
        for _ in 0..=MAX_REDIRECTS {
            let response = self.send(self.client.get(url.clone())).await?;
            if !response.status().is_redirection() {
                return Ok(response);
            }
            let Some(location) = location(&response) else {
                return Ok(response);
            };
            url = url.join(location)?;
            tracing::debug!("Following redirect to {url}");
        }
        Err(Error::TooManyRedirects(url.to_string()))
    }

    /// Sends `request` with the session cookies and keeps the cookies it sets.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let cookies = self.cookies().await;
        let request = if cookies.is_empty() {
            request
        } else {
            request.header(COOKIE, cookies)
        };
        let response = request.send().await?;
        self.state
            .write()
            .await
            .cookies
            .merge_headers(response.headers());
        Ok(response)
    }
}

impl Fetch for GsConnection {
    async fn get_html(&self, url: &str) -> Result<String> {
        GsConnection::get_html(self, url).await
    }
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}
