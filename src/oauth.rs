use std::future::Future;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::{ApiClient, Envelope, Payload, RequestOptions};
use crate::auth::{AuthGrant, SignIn};
use crate::config::RouteSettings;
use crate::error::Error;
use crate::types::Role;

const MISSING_PENDING: &str = "OAuth session is missing. Please continue with Google again.";
const INVALID_OTP: &str = "Please enter a valid 6-digit OTP.";

/// Trades a one-time OAuth code for a session grant.
///
/// Implemented by [`ApiClient`]; the seam lets the bootstrap flow run
/// against any exchanger.
pub trait CodeExchange: Send + Sync + 'static {
    fn exchange(&self, code: &str) -> impl Future<Output = Result<AuthGrant, Error>> + Send;

    /// Navigation destinations the bootstrap flow starts from.
    fn routes(&self) -> RouteSettings {
        RouteSettings::default()
    }
}

impl CodeExchange for ApiClient {
    async fn exchange(&self, code: &str) -> Result<AuthGrant, Error> {
        self.exchange_oauth_code(code).await
    }

    fn routes(&self) -> RouteSettings {
        self.config().routes().clone()
    }
}

/// True for exactly six ASCII digits.
#[must_use]
pub fn is_valid_otp(otp: &str) -> bool {
    otp.len() == 6 && otp.bytes().all(|b| b.is_ascii_digit())
}

/// Keep the digits of raw input, capped at six, as the OTP field does.
#[must_use]
pub fn sanitize_otp(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).take(6).collect()
}

#[derive(Serialize)]
struct ExchangeBody<'a> {
    code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendOtpBody<'a> {
    pending_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteBody<'a> {
    pending_code: &'a str,
    otp: &'a str,
    role: Role,
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

impl ApiClient {
    /// `POST /api/auth/oauth/exchange`, sent without credentials.
    ///
    /// Does not touch the session; the caller decides what to store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, [`Error::Api`] for a
    /// non-2xx status, or [`Error::MalformedResponse`] if the body lacks a
    /// token or a user with a valid role.
    pub async fn exchange_oauth_code(&self, code: &str) -> Result<AuthGrant, Error> {
        let body: Envelope<AuthGrant> = self
            .request(
                Method::POST,
                "/api/auth/oauth/exchange",
                Payload::json(&ExchangeBody { code })?,
                RequestOptions::anonymous(),
            )
            .await?;
        Ok(body.data)
    }

    /// Email a one-time code for a pending OAuth ticket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty ticket, otherwise the API error.
    pub async fn send_oauth_otp(&self, pending: &str) -> Result<Option<String>, Error> {
        if pending.is_empty() {
            return Err(Error::Validation(MISSING_PENDING.into()));
        }
        let body: MessageBody = self
            .request(
                Method::POST,
                "/api/auth/oauth/send-otp",
                Payload::json(&SendOtpBody {
                    pending_code: pending,
                })?,
                RequestOptions::anonymous(),
            )
            .await?;
        tracing::debug!("OAuth OTP sent");
        Ok(body.message)
    }

    /// Finish a pending OAuth sign-in with the emailed code and a chosen role.
    ///
    /// Stores the session on success. Lands on the server's `nextPath`, else
    /// the job-seeker dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty ticket, a malformed OTP or
    /// the admin role, otherwise the API error.
    pub async fn complete_oauth(
        &self,
        pending: &str,
        otp: &str,
        role: Role,
    ) -> Result<SignIn, Error> {
        if pending.is_empty() {
            return Err(Error::Validation(MISSING_PENDING.into()));
        }
        if !is_valid_otp(otp) {
            return Err(Error::Validation(INVALID_OTP.into()));
        }
        if role == Role::Admin {
            return Err(Error::Validation(
                "Role must be either Job Seeker or Employer".into(),
            ));
        }

        let body: Envelope<AuthGrant> = self
            .request(
                Method::POST,
                "/api/auth/oauth/complete",
                Payload::json(&CompleteBody {
                    pending_code: pending,
                    otp,
                    role,
                })?,
                RequestOptions::anonymous(),
            )
            .await?;

        let (session, next_path) = body.data.into_session()?;
        let landing = next_path
            .unwrap_or_else(|| self.config().routes().home_for(Role::JobSeeker).to_owned());
        self.session().establish(session.clone())?;
        tracing::info!(role = %session.role(), "OAuth sign-in completed");
        Ok(SignIn { session, landing })
    }

    /// Where to send the browser to start Google sign-in.
    ///
    /// `redirect_uri` falls back to the configured OAuth redirect URI;
    /// `role` pre-selects the account type for new users.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API base does not form a valid URL.
    pub fn google_sign_in_url(
        &self,
        redirect_uri: Option<&Url>,
        role: Option<Role>,
    ) -> Result<String, Error> {
        let mut url: Url = self
            .config()
            .endpoint("/api/auth/google")
            .parse()
            .map_err(|e| Error::Config(format!("API base: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(uri) = redirect_uri.or(self.config().oauth_redirect_uri()) {
                query.append_pair("redirectUri", uri.as_str());
            }
            if let Some(role) = role {
                query.append_pair("role", role.as_str());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url.into())
    }
}
