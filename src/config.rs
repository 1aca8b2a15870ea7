use std::path::PathBuf;

use url::Url;

use crate::error::Error;
use crate::types::Role;

/// Connection settings for the platform API.
///
/// The API base is a constructor parameter, optional fields use `with_*`.
///
/// ```rust,ignore
/// use hirecare_client::ClientConfig;
///
/// let config = ClientConfig::new("https://api.hirecare.example".parse()?)
///     .with_oauth_redirect_uri("https://hirecare.example".parse()?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) api_base: String,
    pub(crate) oauth_redirect_uri: Option<Url>,
    pub(crate) session_file: Option<PathBuf>,
    pub(crate) routes: RouteSettings,
}

impl ClientConfig {
    /// Config for the API at `api_base`, with default routes.
    #[must_use]
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base: api_base.as_str().trim_end_matches('/').to_owned(),
            oauth_redirect_uri: None,
            session_file: None,
            routes: RouteSettings::default(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `HIRECARE_API_URL`: platform API base URL
    ///
    /// # Optional env vars
    /// - `HIRECARE_OAUTH_REDIRECT_URI`: where Google sign-in returns to
    /// - `HIRECARE_SESSION_FILE`: persist the session as JSON at this path
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `HIRECARE_API_URL` is missing or a URL is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let api_url = std::env::var("HIRECARE_API_URL")
            .map_err(|_| Error::Config("HIRECARE_API_URL is required".into()))?;
        let api_base: Url = api_url
            .parse()
            .map_err(|e| Error::Config(format!("HIRECARE_API_URL: {e}")))?;

        let mut config = Self::new(api_base);

        if let Ok(uri) = std::env::var("HIRECARE_OAUTH_REDIRECT_URI") {
            let uri: Url = uri
                .parse()
                .map_err(|e| Error::Config(format!("HIRECARE_OAUTH_REDIRECT_URI: {e}")))?;
            config = config.with_oauth_redirect_uri(uri);
        }
        if let Ok(path) = std::env::var("HIRECARE_SESSION_FILE") {
            if !path.trim().is_empty() {
                config = config.with_session_file(path);
            }
        }

        Ok(config)
    }

    /// Set where Google sign-in returns to.
    #[must_use]
    pub fn with_oauth_redirect_uri(mut self, uri: Url) -> Self {
        self.oauth_redirect_uri = Some(uri);
        self
    }

    /// Persist the session as JSON at `path`.
    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Override the navigation destinations.
    #[must_use]
    pub fn with_routes(mut self, routes: RouteSettings) -> Self {
        self.routes = routes;
        self
    }

    /// API base without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Configured OAuth return URI, if any.
    #[must_use]
    pub fn oauth_redirect_uri(&self) -> Option<&Url> {
        self.oauth_redirect_uri.as_ref()
    }

    /// Session file path, if sessions are persisted.
    #[must_use]
    pub fn session_file(&self) -> Option<&PathBuf> {
        self.session_file.as_ref()
    }

    /// Navigation destinations.
    #[must_use]
    pub fn routes(&self) -> &RouteSettings {
        &self.routes
    }

    /// Absolute URL for an API path. A missing leading slash is added.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.api_base)
        } else {
            format!("{}/{path}", self.api_base)
        }
    }
}

/// Navigation destinations used by the sign-in flows and the route gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSettings {
    pub(crate) login: String,
    pub(crate) oauth_complete: String,
    pub(crate) jobseeker_home: String,
    pub(crate) employer_home: String,
    pub(crate) admin_home: String,
    pub(crate) employer_onboarding: String,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            login: "/login".into(),
            oauth_complete: "/oauth/complete".into(),
            jobseeker_home: "/dashboard/jobseeker".into(),
            employer_home: "/dashboard/employee/jobs".into(),
            admin_home: "/dashboard/admin".into(),
            employer_onboarding: "/dashboard/employee/profile/create".into(),
        }
    }
}

impl RouteSettings {
    /// Set the login page path.
    #[must_use]
    pub fn with_login(mut self, path: impl Into<String>) -> Self {
        self.login = path.into();
        self
    }

    /// Set the OTP completion page path.
    #[must_use]
    pub fn with_oauth_complete(mut self, path: impl Into<String>) -> Self {
        self.oauth_complete = path.into();
        self
    }

    /// Set `role`'s dashboard path.
    #[must_use]
    pub fn with_home(mut self, role: Role, path: impl Into<String>) -> Self {
        let path = path.into();
        match role {
            Role::JobSeeker => self.jobseeker_home = path,
            Role::Employer => self.employer_home = path,
            Role::Admin => self.admin_home = path,
        }
        self
    }

    /// Login page path.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// OTP completion page path for pending OAuth tickets.
    #[must_use]
    pub fn oauth_complete(&self) -> &str {
        &self.oauth_complete
    }

    /// Where newly registered employers land.
    #[must_use]
    pub fn employer_onboarding(&self) -> &str {
        &self.employer_onboarding
    }

    /// Dashboard a signed-in user lands on by default.
    #[must_use]
    pub fn home_for(&self, role: Role) -> &str {
        match role {
            Role::JobSeeker => &self.jobseeker_home,
            Role::Employer => &self.employer_home,
            Role::Admin => &self.admin_home,
        }
    }

    /// Landing after an OAuth code exchange without a server `nextPath`.
    ///
    /// Only admins are distinguished; employers fall through to the
    /// job-seeker dashboard and rely on the server sending `nextPath`.
    #[must_use]
    pub fn after_oauth_exchange(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_home,
            Role::JobSeeker | Role::Employer => &self.jobseeker_home,
        }
    }
}
