use std::sync::LazyLock;

use regex::Regex;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, Envelope, Payload, RequestOptions};
use crate::config::RouteSettings;
use crate::error::Error;
use crate::password;
use crate::session::Session;
use crate::types::{AccessToken, Role, User};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("valid email regex")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("valid phone regex"));

/// Token, user and optional landing path returned by every sign-in endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct AuthGrant {
    #[serde(rename = "accessToken")]
    pub access_token: AccessToken,
    pub user: User,
    #[serde(rename = "nextPath", default)]
    pub next_path: Option<String>,
}

impl AuthGrant {
    /// Split into a validated session and the server-suggested landing path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the token is empty.
    pub fn into_session(self) -> Result<(Session, Option<String>), Error> {
        let next_path = self.next_path.filter(|p| !p.trim().is_empty());
        let session = Session::new(self.access_token, self.user)
            .map_err(|_| Error::MalformedResponse("empty access token".into()))?;
        Ok((session, next_path))
    }
}

/// Outcome of a successful sign-in: the stored session and where to go next.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SignIn {
    pub session: Session,
    pub landing: String,
}

/// Self-service account creation form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: Role,
}

impl Registration {
    /// Client-side checks mirroring the server's rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every failed check, one per line.
    pub fn validate(&self) -> Result<(), Error> {
        let mut problems = Vec::new();

        if !EMAIL_RE.is_match(&self.email) {
            problems.push("Please enter a valid email address");
        }
        if !password::is_password_valid(&self.password) {
            problems.push("Password must be 6+ chars and include upper, lower, and a number");
        }
        if !(2..=50).contains(&self.first_name.trim().chars().count()) {
            problems.push("First name must be 2-50 characters");
        }
        if !(2..=50).contains(&self.last_name.trim().chars().count()) {
            problems.push("Last name must be 2-50 characters");
        }
        if self.role == Role::Admin {
            problems.push("Role must be either Job Seeker or Employer");
        }
        if !PHONE_RE.is_match(&self.phone) {
            problems.push(
                "Please enter a valid phone number (digits only, optional +, cannot start with 0)",
            );
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems.join("\n")))
        }
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ProfileData {
    #[serde(default)]
    user: Option<User>,
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

impl ApiClient {
    /// Email/password sign-in. Stores the session on success.
    ///
    /// # Errors
    ///
    /// Returns the API error (wrong credentials surface as [`Error::Api`]),
    /// or [`Error::Storage`] if the session cannot be stored.
    pub async fn login(&self, email: &str, password: &str) -> Result<SignIn, Error> {
        let grant: Envelope<AuthGrant> = self
            .request(
                Method::POST,
                "/api/auth/login",
                Payload::json(&Credentials { email, password })?,
                RequestOptions::anonymous(),
            )
            .await?;
        let (session, next_path) = grant.data.into_session()?;
        let landing = next_path
            .unwrap_or_else(|| self.config().routes().home_for(session.role()).to_owned());
        self.session().establish(session.clone())?;
        tracing::info!(role = %session.role(), "Password sign-in successful");
        Ok(SignIn { session, landing })
    }

    /// Create an account and sign straight in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before any request when the form is
    /// invalid, otherwise the API error.
    pub async fn register(&self, registration: &Registration) -> Result<SignIn, Error> {
        registration.validate()?;
        let grant: Envelope<AuthGrant> = self
            .request(
                Method::POST,
                "/api/auth/register",
                Payload::json(registration)?,
                RequestOptions::anonymous(),
            )
            .await?;
        let (session, _) = grant.data.into_session()?;
        let landing = registration_landing(self.config().routes(), registration.role).to_owned();
        self.session().establish(session.clone())?;
        tracing::info!(role = %session.role(), "Registration successful");
        Ok(SignIn { session, landing })
    }

    /// Fetch the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns the API error, or [`Error::MalformedResponse`] if the body has no user.
    pub async fn profile(&self) -> Result<User, Error> {
        let body: Envelope<ProfileData> = self.get("/api/auth/profile").await?;
        body.data
            .user
            .ok_or_else(|| Error::MalformedResponse("profile response has no user".into()))
    }

    /// Re-read the profile and store it alongside the current token.
    ///
    /// Returns `Ok(None)` without a request when nobody is signed in.
    ///
    /// # Errors
    ///
    /// See [`profile`](Self::profile).
    pub async fn reload_profile(&self) -> Result<Option<Session>, Error> {
        if self.session().access_token().is_none() {
            return Ok(None);
        }
        let user = self.profile().await?;
        // The token may have been rotated by a refresh during the request.
        let Some(token) = self.session().access_token() else {
            return Ok(None);
        };
        let session = Session::new(token, user)?;
        self.session().establish(session.clone())?;
        Ok(Some(session))
    }

    /// Email a password-reset code. Returns the server's confirmation message.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn send_password_reset_otp(&self, email: &str) -> Result<Option<String>, Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            email: &'a str,
        }
        let body: MessageBody = self
            .request(
                Method::POST,
                "/api/auth/forgot-password/send-otp",
                Payload::json(&Body { email })?,
                RequestOptions::anonymous(),
            )
            .await?;
        Ok(body.message)
    }

    /// Set a new password using the emailed code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the new password breaks a rule,
    /// otherwise the API error.
    pub async fn verify_password_reset_otp(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<Option<String>, Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            email: &'a str,
            otp: &'a str,
            password: &'a str,
        }
        if !password::is_password_valid(new_password) {
            return Err(Error::Validation(
                "Password must be 6+ chars and include upper, lower, and a number".into(),
            ));
        }
        let body: MessageBody = self
            .request(
                Method::POST,
                "/api/auth/forgot-password/verify-otp",
                Payload::json(&Body {
                    email,
                    otp,
                    password: new_password,
                })?,
                RequestOptions::anonymous(),
            )
            .await?;
        Ok(body.message)
    }
}

fn registration_landing(routes: &RouteSettings, role: Role) -> &str {
    match role {
        Role::Employer => routes.employer_onboarding(),
        Role::JobSeeker | Role::Admin => routes.home_for(Role::JobSeeker),
    }
}
