use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::Value as JsonValue;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::session::SessionContext;
use crate::types::AccessToken;

const FALLBACK_ERROR_MESSAGE: &str = "Request failed";

/// `{ "data": ..., "message": ... }` wrapper used by every platform endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
}

/// Per-request switches.
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions {
    /// Send without the `Authorization` header (login, register, OAuth).
    pub skip_auth: bool,
    /// On `401`, refresh the access token once and repeat the request.
    pub retry_on_auth_error: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            skip_auth: false,
            retry_on_auth_error: true,
        }
    }
}

impl RequestOptions {
    /// No bearer token and no refresh retry.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            skip_auth: true,
            retry_on_auth_error: false,
        }
    }
}

/// Request body. Kept by value so a request can be replayed after a refresh.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Payload {
    Empty,
    Json(JsonValue),
    #[cfg(feature = "resume")]
    File {
        field: &'static str,
        filename: String,
        bytes: Vec<u8>,
        mime: Option<String>,
    },
}

impl Payload {
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `body` cannot be represented as JSON.
    pub fn json<B: serde::Serialize + ?Sized>(body: &B) -> Result<Self, Error> {
        serde_json::to_value(body)
            .map(Self::Json)
            .map_err(|e| Error::Validation(format!("request body: {e}")))
    }

    fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder, Error> {
        match self {
            Self::Empty => Ok(request.header(CONTENT_TYPE, "application/json")),
            Self::Json(body) => Ok(request.json(body)),
            #[cfg(feature = "resume")]
            Self::File {
                field,
                filename,
                bytes,
                mime,
            } => {
                let mut part =
                    reqwest::multipart::Part::bytes(bytes.clone()).file_name(filename.clone());
                if let Some(mime) = mime {
                    part = part.mime_str(mime)?;
                }
                Ok(request.multipart(reqwest::multipart::Form::new().part(*field, part)))
            }
        }
    }
}

/// HTTP client for the platform API.
///
/// Attaches the session's bearer token, keeps the refresh cookie, and
/// transparently refreshes the token once when a request comes back `401`.
#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    session: SessionContext,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_base", &self.config.api_base())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client with a cookie-enabled HTTP connection pool.
    #[must_use]
    pub fn new(config: ClientConfig, session: SessionContext) -> Self {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap_or_default();
        Self {
            config,
            http,
            session,
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Settings this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session this client reads tokens from and writes to.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(Method::GET, path, Payload::Empty, RequestOptions::default())
            .await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Payload::json(body)?, RequestOptions::default())
            .await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn patch<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(Method::PATCH, path, Payload::Empty, RequestOptions::default())
            .await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(Method::DELETE, path, Payload::Empty, RequestOptions::default())
            .await
    }

    /// Send a request and decode the JSON response.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] on network failure
    /// - [`Error::Api`] for any non-2xx status, carrying the server's `message`
    /// - [`Error::MalformedResponse`] if a 2xx body does not decode as `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<T, Error> {
        let url = self.config.endpoint(path);
        let token = if options.skip_auth {
            None
        } else {
            self.session.access_token()
        };

        let mut response = self
            .send(method.clone(), &url, &payload, token.as_ref())
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && !options.skip_auth
            && options.retry_on_auth_error
        {
            if let Some(token) = self.refresh_access_token().await? {
                response = self.send(method, &url, &payload, Some(&token)).await?;
            }
        }

        decode(response).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        payload: &Payload,
        token: Option<&AccessToken>,
    ) -> Result<reqwest::Response, Error> {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }
        Ok(payload.apply(request)?.send().await?)
    }

    /// Trade the refresh cookie for a new access token.
    ///
    /// Returns `None` and clears the session when the server refuses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or [`Error::Storage`] if
    /// the rotated session cannot be persisted.
    pub async fn refresh_access_token(&self) -> Result<Option<AccessToken>, Error> {
        #[derive(Deserialize)]
        struct RefreshData {
            #[serde(rename = "accessToken", default)]
            access_token: Option<String>,
        }
        #[derive(Deserialize)]
        struct RefreshBody {
            #[serde(default)]
            data: Option<RefreshData>,
        }

        let response = self
            .send(
                Method::POST,
                &self.config.endpoint("/api/auth/refresh-token"),
                &Payload::Empty,
                None,
            )
            .await?;

        let status = response.status();
        let token = if status.is_success() {
            response
                .json::<RefreshBody>()
                .await
                .ok()
                .and_then(|b| b.data)
                .and_then(|d| d.access_token)
                .filter(|t| !t.is_empty())
        } else {
            None
        };

        let Some(token) = token.map(AccessToken::from) else {
            tracing::warn!(status = status.as_u16(), "Access token refresh failed");
            if let Err(e) = self.session.clear() {
                tracing::warn!(error = %e, "Session clear failed after refresh failure");
            }
            return Ok(None);
        };

        self.session.rotate_token(token.clone())?;
        tracing::debug!("Access token refreshed");
        Ok(Some(token))
    }

    /// End the server session and drop the local one.
    ///
    /// The local session is cleared even when the server call fails.
    ///
    /// # Errors
    ///
    /// Returns the server error, or [`Error::Storage`] if clearing failed.
    pub async fn logout(&self) -> Result<(), Error> {
        let result = self
            .request::<IgnoredAny>(
                Method::POST,
                "/api/auth/logout",
                Payload::Empty,
                RequestOptions::default(),
            )
            .await;
        let cleared = self.session.clear();
        match &result {
            Ok(_) => tracing::info!("Signed out"),
            Err(e) => tracing::warn!(error = %e, "Logout request failed, local session cleared"),
        }
        result?;
        cleared
    }
}

/// Mirror of the web client's `res.json().catch(() => ({}))` handling.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);

    if !status.is_success() {
        let message = body
            .get("message")
            .and_then(JsonValue::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(FALLBACK_ERROR_MESSAGE)
            .to_owned();
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_value(body).map_err(|e| Error::MalformedResponse(e.to_string()))
}
