//! The [`SessionClient`]: login plus bearer-authorized requests.

use std::fmt;

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{ApiEndpoints, Credentials, HttpTimeouts, LoginOutcome, SessionError};
use crate::http_client::{ClientOptions, build_http_client};

/// Header set by the edge on challenge responses.
const CHALLENGE_HEADER: &str = "cf-mitigated";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Authenticated HTTP session shared by the resolver.
///
/// The token is written only by [`login`](Self::login), which takes
/// `&mut self`; every request method takes `&self`, so a logged-in client can
/// be shared read-only across tasks.
#[derive(Clone)]
pub struct SessionClient {
    client: Client,
    endpoints: ApiEndpoints,
    token: Option<String>,
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("endpoints", &self.endpoints)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Creates an anonymous session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(endpoints: ApiEndpoints, timeouts: HttpTimeouts) -> Result<Self, SessionError> {
        let client = build_http_client(ClientOptions {
            name: "api",
            connect_timeout: timeouts.connect,
            request_timeout: Some(timeouts.request),
            read_timeout: None,
            cookie_store: true,
            gzip: true,
        })?;
        debug!(api = %endpoints.api_base_url, "created API session client");
        Ok(Self {
            client,
            endpoints,
            token: None,
        })
    }

    /// The endpoints this session talks to.
    #[must_use]
    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// True once a login stored a token.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Logs in with `credentials`.
    ///
    /// On any failure (blank credentials, transport error, unparseable body,
    /// missing token) the session stays anonymous and the reason is returned
    /// in [`LoginOutcome::Failed`].
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&mut self, credentials: &Credentials) -> LoginOutcome {
        if credentials.is_blank() {
            warn!("login skipped: credentials are blank");
            return LoginOutcome::failed("credentials are blank");
        }

        let url = self.endpoints.login_url();
        let body = LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        };

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "API login request failed; continuing anonymously");
                return LoginOutcome::failed(format!("login request failed: {error}"));
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(error) => {
                warn!(status, error = %error, "API login body unreadable; continuing anonymously");
                return LoginOutcome::failed(format!("login response unreadable: {error}"));
            }
        };

        match serde_json::from_str::<LoginResponse>(&text) {
            Ok(LoginResponse { token: Some(token) }) if !token.is_empty() => {
                self.token = Some(token);
                info!(status, "API login succeeded");
                LoginOutcome::Authenticated
            }
            Ok(_) => {
                warn!(status, "API login response carried no token; continuing anonymously");
                LoginOutcome::failed(format!("login response (HTTP {status}) carried no token"))
            }
            Err(error) => {
                warn!(status, error = %error, "API login response unparseable; continuing anonymously");
                LoginOutcome::failed(format!(
                    "login response (HTTP {status}) was not valid JSON: {error}"
                ))
            }
        }
    }

    /// `GET url` with query `params`, bearer-authorized when a token is held.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] on an invalid URL, transport failure,
    /// challenge response or non-success status.
    #[instrument(level = "debug", skip(self, params), fields(authenticated = self.token.is_some()))]
    pub async fn authorized_get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Response, SessionError> {
        let mut parsed = Url::parse(url).map_err(|_| SessionError::invalid_url(url))?;
        if !params.is_empty() {
            let mut pairs = parsed.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        let request = self.client.get(parsed.as_str());
        self.send(request, url).await
    }

    /// `GET url` with extra request `headers`, bearer-authorized when a token
    /// is held. The body is left unread so callers can stream it.
    ///
    /// # Errors
    ///
    /// Same as [`authorized_get`](Self::authorized_get).
    #[instrument(level = "debug", skip(self, headers), fields(authenticated = self.token.is_some()))]
    pub async fn authorized_get_with_headers(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response, SessionError> {
        Url::parse(url).map_err(|_| SessionError::invalid_url(url))?;
        let request = self.client.get(url).headers(headers);
        self.send(request, url).await
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, SessionError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::from_reqwest(url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if is_challenge(&response) {
            warn!(url, status = status.as_u16(), "edge returned an anti-automation challenge");
            return Err(SessionError::challenged(url, status.as_u16()));
        }
        Err(SessionError::http_status(url, status.as_u16()))
    }
}

/// A challenge is flagged by the edge header, or is an HTML page served with
/// a blocking status where the API would return JSON.
fn is_challenge(response: &Response) -> bool {
    let headers = response.headers();
    if headers
        .get(CHALLENGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("challenge"))
    {
        return true;
    }

    let is_html = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("text/html"));
    is_html && matches!(response.status().as_u16(), 403 | 429 | 503)
}
