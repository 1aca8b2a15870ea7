//! Completion of an OAuth sign-in on the page the provider redirects back to.
//!
//! A [`SessionBootstrap`] is created once per navigation to the OAuth return
//! page. It reads the query, then either forwards a pending ticket to the
//! OTP completion page, fails with a missing-code error, or exchanges the
//! code for a session and redirects to a dashboard.
//!
//! The exchange runs at most once per instance. If the page is left before
//! the exchange resolves, [`SessionBootstrap::abandon`] makes the late result
//! a no-op: no session write, no navigation, no toast. There is no retry and
//! no timeout; an exchange that never resolves keeps the view on
//! [`BootstrapView::SigningIn`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::RouteSettings;
use crate::error::Error;
use crate::navigation::{Navigator, PendingOAuthState};
use crate::oauth::CodeExchange;
use crate::session::SessionContext;
use crate::toast::Toaster;

pub const SIGNING_IN_TEXT: &str = "Signing you in…";
pub const MISSING_CODE_MESSAGE: &str = "Missing OAuth exchange code.";

/// What the OAuth return page should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapView {
    /// Query not processed yet.
    Init,
    /// Exchange in flight; show [`SIGNING_IN_TEXT`].
    SigningIn,
    /// A replace navigation to `to` was issued.
    Redirecting { to: String },
    /// Terminal. Show `message` and a link to `login_path`.
    Failed { message: String, login_path: String },
}

impl BootstrapView {
    /// True once the flow has redirected or failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redirecting { .. } | Self::Failed { .. })
    }
}

/// One OAuth return navigation.
pub struct SessionBootstrap<E, N, T> {
    exchanger: Arc<E>,
    session: SessionContext,
    navigator: Arc<N>,
    toaster: Arc<T>,
    routes: RouteSettings,
    query: PendingOAuthState,
    view: watch::Sender<BootstrapView>,
    launched: AtomicBool,
    abandoned: AtomicBool,
}

impl<E, N, T> SessionBootstrap<E, N, T>
where
    E: CodeExchange,
    N: Navigator,
    T: Toaster,
{
    /// Flow for one return navigation. Routes come from the exchanger.
    #[must_use]
    pub fn new(
        exchanger: Arc<E>,
        session: SessionContext,
        navigator: Arc<N>,
        toaster: Arc<T>,
        query: PendingOAuthState,
    ) -> Self {
        let (view, _) = watch::channel(BootstrapView::Init);
        let routes = exchanger.routes();
        Self {
            exchanger,
            session,
            navigator,
            toaster,
            routes,
            query,
            view,
            launched: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
        }
    }

    /// Override the navigation destinations.
    #[must_use]
    pub fn with_routes(mut self, routes: RouteSettings) -> Self {
        self.routes = routes;
        self
    }

    /// Current view state.
    #[must_use]
    pub fn view(&self) -> BootstrapView {
        self.view.borrow().clone()
    }

    /// Re-render feed for the UI shell.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BootstrapView> {
        self.view.subscribe()
    }

    /// Mark this navigation as gone. Any result arriving later is dropped.
    pub fn abandon(&self) {
        if !self.abandoned.swap(true, Ordering::SeqCst) {
            tracing::debug!("OAuth bootstrap abandoned");
        }
    }

    /// Whether [`abandon`](Self::abandon) has been called.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Run the flow on the current runtime as a background task.
    ///
    /// Returns `None` if the flow was already started by this instance.
    pub fn launch(self: &Arc<Self>) -> Option<JoinHandle<BootstrapView>> {
        if self.launched.swap(true, Ordering::SeqCst) {
            return None;
        }
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.drive().await }))
    }

    /// Drive the flow to completion and return the final view.
    ///
    /// Only the first call does any work; later calls return the current view.
    pub async fn run(&self) -> BootstrapView {
        if self.launched.swap(true, Ordering::SeqCst) {
            return self.view();
        }
        self.drive().await
    }

    async fn drive(&self) -> BootstrapView {
        if self.is_abandoned() {
            return self.view();
        }

        match &self.query {
            PendingOAuthState::Pending(ticket) => {
                let to = format!(
                    "{}?pending={}",
                    self.routes.oauth_complete(),
                    urlencoding::encode(ticket)
                );
                tracing::debug!(to = %to, "Forwarding pending OAuth ticket");
                self.redirect(to);
            }
            PendingOAuthState::Missing => {
                tracing::warn!("OAuth return without exchange code");
                self.fail(MISSING_CODE_MESSAGE.to_owned());
            }
            PendingOAuthState::Code(code) => {
                self.view.send_replace(BootstrapView::SigningIn);
                let result = self.exchanger.exchange(code).await;
                if self.is_abandoned() {
                    tracing::debug!("Dropping OAuth exchange result for abandoned navigation");
                    return self.view();
                }
                match self.sign_in(result) {
                    Ok(to) => self.redirect(to),
                    Err(e) => {
                        tracing::error!(error = %e, "OAuth code exchange failed");
                        let message = format!("Authentication failed: {e}");
                        self.toaster.error(&message);
                        self.fail(message);
                    }
                }
            }
        }

        self.view()
    }

    /// Store the exchanged session and pick the landing path.
    fn sign_in(&self, result: Result<crate::auth::AuthGrant, Error>) -> Result<String, Error> {
        let (session, next_path) = result?.into_session()?;
        let to = next_path
            .unwrap_or_else(|| self.routes.after_oauth_exchange(session.role()).to_owned());
        let role = session.role();
        self.session.establish(session)?;
        tracing::info!(role = %role, "OAuth sign-in successful");
        Ok(to)
    }

    fn redirect(&self, to: String) {
        self.navigator.replace(&to);
        self.view.send_replace(BootstrapView::Redirecting { to });
    }

    fn fail(&self, message: String) {
        self.view.send_replace(BootstrapView::Failed {
            message,
            login_path: self.routes.login().to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;

    use super::*;
    use crate::api::ApiClient;
    use crate::auth::AuthGrant;
    use crate::config::ClientConfig;
    use crate::navigation::{MemoryHistory, Navigation};
    use crate::session::{Session, SessionStorage};
    use crate::toast::{ToastLevel, ToastQueue};
    use crate::types::Role;

    struct FakeExchange {
        reply: Mutex<Option<Result<AuthGrant, Error>>>,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl FakeExchange {
        fn replying(reply: Result<AuthGrant, Error>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn gated(reply: Result<AuthGrant, Error>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::replying(reply)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CodeExchange for FakeExchange {
        async fn exchange(&self, _code: &str) -> Result<AuthGrant, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.reply
                .lock()
                .unwrap()
                .take()
                .expect("exchange called more than once")
        }
    }

    fn grant(role: &str, next_path: Option<&str>) -> AuthGrant {
        let mut data = serde_json::json!({"accessToken": "tok1", "user": {"role": role}});
        if let Some(next) = next_path {
            data["nextPath"] = next.into();
        }
        serde_json::from_value(data).unwrap()
    }

    struct Harness {
        exchanger: Arc<FakeExchange>,
        session: SessionContext,
        history: Arc<MemoryHistory>,
        toasts: Arc<ToastQueue>,
    }

    impl Harness {
        fn new(exchanger: FakeExchange) -> Self {
            Self {
                exchanger: Arc::new(exchanger),
                session: SessionContext::in_memory(),
                history: Arc::new(MemoryHistory::new("/oauth/success")),
                toasts: Arc::new(ToastQueue::new()),
            }
        }

        fn flow(
            &self,
            query: &str,
        ) -> SessionBootstrap<FakeExchange, MemoryHistory, ToastQueue> {
            SessionBootstrap::new(
                self.exchanger.clone(),
                self.session.clone(),
                self.history.clone(),
                self.toasts.clone(),
                PendingOAuthState::from_query(query),
            )
        }
    }

    #[tokio::test]
    async fn admin_lands_on_admin_dashboard() {
        let h = Harness::new(FakeExchange::replying(Ok(grant("admin", None))));
        let view = h.flow("code=abc123").run().await;

        assert_eq!(
            view,
            BootstrapView::Redirecting {
                to: "/dashboard/admin".into()
            }
        );
        let session = h.session.current().unwrap();
        assert_eq!(session.token().as_str(), "tok1");
        assert_eq!(session.role(), Role::Admin);
        assert_eq!(
            h.history.navigations(),
            vec![Navigation::Replace("/dashboard/admin".into())]
        );
        assert!(h.toasts.is_empty());
    }

    #[tokio::test]
    async fn employer_falls_back_to_jobseeker_dashboard() {
        let h = Harness::new(FakeExchange::replying(Ok(grant("employer", None))));
        h.flow("code=abc123").run().await;

        assert_eq!(
            h.history.navigations(),
            vec![Navigation::Replace("/dashboard/jobseeker".into())]
        );
        assert_eq!(h.session.role(), Some(Role::Employer));
    }

    #[tokio::test]
    async fn server_next_path_wins() {
        let h = Harness::new(FakeExchange::replying(Ok(grant(
            "employer",
            Some("/dashboard/employee/jobs"),
        ))));
        h.flow("code=abc123").run().await;

        assert_eq!(
            h.history.current().as_deref(),
            Some("/dashboard/employee/jobs")
        );
    }

    #[tokio::test]
    async fn pending_ticket_is_forwarded_without_exchange() {
        let h = Harness::new(FakeExchange::replying(Ok(grant("admin", None))));
        let view = h.flow("pending=xyz").run().await;

        assert_eq!(
            view,
            BootstrapView::Redirecting {
                to: "/oauth/complete?pending=xyz".into()
            }
        );
        assert_eq!(
            h.history.navigations(),
            vec![Navigation::Replace("/oauth/complete?pending=xyz".into())]
        );
        assert_eq!(h.exchanger.calls(), 0);
        assert!(h.session.current().is_none());
    }

    #[tokio::test]
    async fn pending_ticket_is_percent_encoded() {
        let h = Harness::new(FakeExchange::replying(Ok(grant("admin", None))));
        h.flow("pending=a%2Bb%20c%26d").run().await;

        assert_eq!(
            h.history.current().as_deref(),
            Some("/oauth/complete?pending=a%2Bb%20c%26d")
        );
    }

    #[tokio::test]
    async fn missing_code_fails_without_side_effects() {
        let h = Harness::new(FakeExchange::replying(Ok(grant("admin", None))));
        let view = h.flow("").run().await;

        assert_eq!(
            view,
            BootstrapView::Failed {
                message: "Missing OAuth exchange code.".into(),
                login_path: "/login".into()
            }
        );
        assert_eq!(h.exchanger.calls(), 0);
        assert!(h.session.current().is_none());
        assert!(h.history.navigations().is_empty());
        assert!(h.toasts.is_empty());
    }

    #[tokio::test]
    async fn exchange_failure_toasts_and_keeps_session() {
        let h = Harness::new(FakeExchange::replying(Err(Error::Api {
            status: 503,
            message: "network down".into(),
        })));
        let view = h.flow("code=abc123").run().await;

        assert_eq!(
            view,
            BootstrapView::Failed {
                message: "Authentication failed: network down".into(),
                login_path: "/login".into()
            }
        );
        let toasts = h.toasts.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, "Authentication failed: network down");
        assert!(h.session.current().is_none());
        assert!(h.history.navigations().is_empty());
    }

    #[tokio::test]
    async fn exchange_failure_does_not_touch_existing_session() {
        let h = Harness::new(FakeExchange::replying(Err(Error::Api {
            status: 400,
            message: "Code expired".into(),
        })));
        let existing =
            crate::session::Session::new("old", crate::types::User::new(Role::JobSeeker)).unwrap();
        h.session.establish(existing.clone()).unwrap();

        h.flow("code=abc123").run().await;
        assert_eq!(h.session.current(), Some(existing));
    }

    #[tokio::test]
    async fn second_run_does_not_exchange_again() {
        let h = Harness::new(FakeExchange::replying(Ok(grant("admin", None))));
        let flow = h.flow("code=abc123");
        let first = flow.run().await;
        let second = flow.run().await;

        assert_eq!(first, second);
        assert_eq!(h.exchanger.calls(), 1);
        assert_eq!(h.history.navigations().len(), 1);
    }

    #[tokio::test]
    async fn launch_is_idempotent() {
        let h = Harness::new(FakeExchange::replying(Ok(grant("jobseeker", None))));
        let flow = Arc::new(h.flow("code=abc123"));

        let handle = flow.launch().expect("first launch");
        let view = handle.await.unwrap();
        assert!(flow.launch().is_none());
        assert_eq!(
            view,
            BootstrapView::Redirecting {
                to: "/dashboard/jobseeker".into()
            }
        );
        assert_eq!(h.exchanger.calls(), 1);
    }

    #[tokio::test]
    async fn abandoned_flow_ignores_late_result() {
        let gate = Arc::new(Notify::new());
        let h = Harness::new(FakeExchange::gated(Ok(grant("admin", None)), gate.clone()));
        let flow = Arc::new(h.flow("code=abc123"));
        let mut views = flow.subscribe();

        let handle = flow.launch().unwrap();
        views
            .wait_for(|v| *v == BootstrapView::SigningIn)
            .await
            .unwrap();

        flow.abandon();
        gate.notify_one();
        let view = handle.await.unwrap();

        assert_eq!(view, BootstrapView::SigningIn);
        assert!(h.session.current().is_none());
        assert!(h.history.navigations().is_empty());
        assert!(h.toasts.is_empty());
    }

    #[tokio::test]
    async fn unresolved_exchange_stays_signing_in() {
        let gate = Arc::new(Notify::new());
        let h = Harness::new(FakeExchange::gated(Ok(grant("admin", None)), gate));
        let flow = Arc::new(h.flow("code=abc123"));
        let mut views = flow.subscribe();

        let handle = flow.launch().unwrap();
        views
            .wait_for(|v| *v == BootstrapView::SigningIn)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(flow.view(), BootstrapView::SigningIn);
        assert!(!flow.view().is_terminal());
        handle.abort();
    }

    #[tokio::test]
    async fn abandoned_before_start_does_nothing() {
        let h = Harness::new(FakeExchange::replying(Ok(grant("admin", None))));
        let flow = h.flow("code=abc123");
        flow.abandon();
        assert_eq!(flow.run().await, BootstrapView::Init);
        assert_eq!(h.exchanger.calls(), 0);
    }

    struct RefusingStorage;

    impl SessionStorage for RefusingStorage {
        fn load(&self) -> Result<Option<Session>, Error> {
            Ok(None)
        }
        fn save(&self, _: &Session) -> Result<(), Error> {
            Err(Error::Storage("read-only".into()))
        }
        fn clear(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn storage_failure_fails_without_navigating() {
        let h = Harness {
            session: SessionContext::new(RefusingStorage),
            ..Harness::new(FakeExchange::replying(Ok(grant("admin", None))))
        };
        let view = h.flow("code=abc123").run().await;

        let message = "Authentication failed: Session storage error: read-only";
        assert_eq!(
            view,
            BootstrapView::Failed {
                message: message.into(),
                login_path: "/login".into()
            }
        );
        assert_eq!(h.toasts.drain()[0].message, message);
        assert!(h.session.current().is_none());
        assert!(h.history.navigations().is_empty());
    }

    fn unreachable_client(routes: RouteSettings, session: SessionContext) -> ApiClient {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ClientConfig::new(format!("http://127.0.0.1:{port}").parse().unwrap())
            .with_routes(routes);
        ApiClient::new(config, session)
    }

    #[tokio::test]
    async fn transport_error_reaches_failure_view() {
        let session = SessionContext::in_memory();
        let api = Arc::new(unreachable_client(RouteSettings::default(), session.clone()));
        let history = Arc::new(MemoryHistory::new("/oauth/success"));
        let toasts = Arc::new(ToastQueue::new());
        let flow = SessionBootstrap::new(
            api,
            session.clone(),
            history.clone(),
            toasts.clone(),
            PendingOAuthState::from_query("code=abc123"),
        );

        let BootstrapView::Failed { message, login_path } = flow.run().await else {
            panic!("expected a failed view");
        };
        assert!(message.starts_with("Authentication failed: "));
        assert_eq!(login_path, "/login");
        let toasts = toasts.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, ToastLevel::Error);
        assert!(session.current().is_none());
        assert!(history.navigations().is_empty());
    }

    #[tokio::test]
    async fn routes_come_from_client_config() {
        let session = SessionContext::in_memory();
        let routes = RouteSettings::default()
            .with_login("/sign-in")
            .with_oauth_complete("/auth/finish");
        let api = Arc::new(unreachable_client(routes, session.clone()));
        let history = Arc::new(MemoryHistory::new("/oauth/success"));
        let toasts = Arc::new(ToastQueue::new());

        let missing = SessionBootstrap::new(
            api.clone(),
            session.clone(),
            history.clone(),
            toasts.clone(),
            PendingOAuthState::Missing,
        );
        assert_eq!(
            missing.run().await,
            BootstrapView::Failed {
                message: MISSING_CODE_MESSAGE.into(),
                login_path: "/sign-in".into()
            }
        );

        let pending = SessionBootstrap::new(
            api,
            session,
            history.clone(),
            toasts,
            PendingOAuthState::from_query("pending=t1"),
        );
        pending.run().await;
        assert_eq!(history.current().as_deref(), Some("/auth/finish?pending=t1"));
    }
}
