use std::collections::HashSet;

use crate::config::{ClientConfig, RouteSettings};
use crate::error::Error;
use crate::navigation::Navigator;
use crate::session::{Session, SessionContext};
use crate::types::Role;

/// Where users whose role is not allowed are sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeniedRedirect {
    /// The user's own dashboard.
    #[default]
    RoleHome,
    /// A single fixed path, e.g. an access-denied page.
    Fixed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoSession,
    RoleMismatch(Role),
}

/// Result of checking the session against a gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render,
    Redirect { to: String, reason: DenyReason },
}

impl GateDecision {
    /// True when the protected content may be built.
    #[must_use]
    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render)
    }
}

/// Output of [`RouteGate::guard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gated<C> {
    Render(C),
    /// A redirect was issued; render nothing (or a loading placeholder).
    Redirecting,
}

impl<C> Gated<C> {
    /// The rendered content, or `None` after a redirect.
    #[must_use]
    pub fn into_content(self) -> Option<C> {
        match self {
            Self::Render(c) => Some(c),
            Self::Redirecting => None,
        }
    }
}

/// Role-based guard around a protected page subtree.
///
/// Reads only the local session; token validity is the API layer's concern.
#[derive(Debug, Clone)]
pub struct RouteGate {
    roles: HashSet<Role>,
    routes: RouteSettings,
    denied: DeniedRedirect,
}

impl RouteGate {
    /// Gate admitting any role in `roles`, with default routes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `roles` is empty.
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Result<Self, Error> {
        let roles: HashSet<Role> = roles.into_iter().collect();
        if roles.is_empty() {
            return Err(Error::Config("route gate needs at least one role".into()));
        }
        Ok(Self {
            roles,
            routes: RouteSettings::default(),
            denied: DeniedRedirect::default(),
        })
    }

    /// Gate using the route settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `roles` is empty.
    pub fn from_config(
        config: &ClientConfig,
        roles: impl IntoIterator<Item = Role>,
    ) -> Result<Self, Error> {
        Ok(Self::new(roles)?.with_routes(config.routes().clone()))
    }

    /// Gate admitting a single role.
    #[must_use]
    pub fn only(role: Role) -> Self {
        Self {
            roles: HashSet::from([role]),
            routes: RouteSettings::default(),
            denied: DeniedRedirect::default(),
        }
    }

    /// Override the login and role-home destinations.
    #[must_use]
    pub fn with_routes(mut self, routes: RouteSettings) -> Self {
        self.routes = routes;
        self
    }

    /// Where users with a role outside the set are sent.
    #[must_use]
    pub fn with_denied_redirect(mut self, denied: DeniedRedirect) -> Self {
        self.denied = denied;
        self
    }

    /// Whether `role` is in the allowed set.
    #[must_use]
    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Pure decision for a given session snapshot.
    #[must_use]
    pub fn decide(&self, session: Option<&Session>) -> GateDecision {
        let Some(session) = session else {
            return GateDecision::Redirect {
                to: self.routes.login().to_owned(),
                reason: DenyReason::NoSession,
            };
        };

        let role = session.role();
        if self.allows(role) {
            return GateDecision::Render;
        }

        let to = match &self.denied {
            DeniedRedirect::RoleHome => self.routes.home_for(role).to_owned(),
            DeniedRedirect::Fixed(path) => path.clone(),
        };
        GateDecision::Redirect {
            to,
            reason: DenyReason::RoleMismatch(role),
        }
    }

    /// Decision for whatever the session context holds right now.
    #[must_use]
    pub fn check(&self, session: &SessionContext) -> GateDecision {
        self.decide(session.current().as_ref())
    }

    /// Check, then either build the protected content or redirect.
    ///
    /// `children` is only called when the decision is [`GateDecision::Render`],
    /// so nothing protected is built for a user who is being sent away.
    pub fn guard<C, N>(
        &self,
        session: &SessionContext,
        navigator: &N,
        children: impl FnOnce() -> C,
    ) -> Gated<C>
    where
        N: Navigator + ?Sized,
    {
        match self.check(session) {
            GateDecision::Render => Gated::Render(children()),
            GateDecision::Redirect { to, reason } => {
                match reason {
                    DenyReason::NoSession => {
                        tracing::debug!(to = %to, "No session, redirecting to login");
                    }
                    DenyReason::RoleMismatch(role) => {
                        tracing::warn!(role = %role, to = %to, "Role not allowed here");
                    }
                }
                navigator.replace(&to);
                Gated::Redirecting
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{MemoryHistory, Navigation};
    use crate::types::User;

    fn signed_in(role: Role) -> SessionContext {
        let ctx = SessionContext::in_memory();
        ctx.establish(Session::new("tok1", User::new(role)).unwrap())
            .unwrap();
        ctx
    }

    #[test]
    fn empty_role_set_is_rejected() {
        assert!(RouteGate::new(Vec::<Role>::new()).is_err());
    }

    #[test]
    fn admin_passes_admin_gate() {
        let history = MemoryHistory::new("/dashboard/admin");
        let out = RouteGate::only(Role::Admin).guard(&signed_in(Role::Admin), &history, || "panel");
        assert_eq!(out, Gated::Render("panel"));
        assert!(history.navigations().is_empty());
    }

    #[test]
    fn admin_is_redirected_from_other_gates() {
        for role in [Role::Employer, Role::JobSeeker] {
            let history = MemoryHistory::new("/dashboard");
            let mut built = false;
            let out = RouteGate::only(role).guard(&signed_in(Role::Admin), &history, || {
                built = true;
            });
            assert_eq!(out, Gated::Redirecting);
            assert!(!built, "children must not be built for a denied user");
            assert_eq!(
                history.navigations(),
                vec![Navigation::Replace("/dashboard/admin".into())]
            );
        }
    }

    #[test]
    fn no_session_goes_to_login_for_any_roles() {
        let ctx = SessionContext::in_memory();
        for roles in [
            vec![Role::Admin],
            vec![Role::Employer],
            vec![Role::JobSeeker, Role::Employer, Role::Admin],
        ] {
            let gate = RouteGate::new(roles).unwrap();
            assert_eq!(
                gate.check(&ctx),
                GateDecision::Redirect {
                    to: "/login".into(),
                    reason: DenyReason::NoSession
                }
            );
        }
    }

    #[test]
    fn multi_role_gate() {
        let gate = RouteGate::new([Role::JobSeeker, Role::Employer]).unwrap();
        assert!(gate.check(&signed_in(Role::Employer)).is_render());
        assert!(gate.check(&signed_in(Role::JobSeeker)).is_render());
        assert!(!gate.check(&signed_in(Role::Admin)).is_render());
    }

    #[test]
    fn fixed_denied_destination() {
        let gate = RouteGate::only(Role::Admin)
            .with_denied_redirect(DeniedRedirect::Fixed("/unauthorized".into()));
        assert_eq!(
            gate.check(&signed_in(Role::Employer)),
            GateDecision::Redirect {
                to: "/unauthorized".into(),
                reason: DenyReason::RoleMismatch(Role::Employer)
            }
        );
    }

    #[test]
    fn configured_routes_reach_the_gate() {
        let routes = RouteSettings::default()
            .with_login("/sign-in")
            .with_home(Role::Employer, "/employer");
        let config =
            ClientConfig::new("https://api.example.com".parse().unwrap()).with_routes(routes);
        let gate = RouteGate::from_config(&config, [Role::Admin]).unwrap();

        assert_eq!(
            gate.check(&SessionContext::in_memory()),
            GateDecision::Redirect {
                to: "/sign-in".into(),
                reason: DenyReason::NoSession
            }
        );
        assert_eq!(
            gate.check(&signed_in(Role::Employer)),
            GateDecision::Redirect {
                to: "/employer".into(),
                reason: DenyReason::RoleMismatch(Role::Employer)
            }
        );
        assert!(RouteGate::from_config(&config, Vec::<Role>::new()).is_err());
    }

    #[test]
    fn gate_follows_session_changes() {
        let ctx = SessionContext::in_memory();
        let gate = RouteGate::only(Role::JobSeeker);
        assert!(!gate.check(&ctx).is_render());

        ctx.establish(Session::new("tok1", User::new(Role::JobSeeker)).unwrap())
            .unwrap();
        assert!(gate.check(&ctx).is_render());

        ctx.clear().unwrap();
        assert!(!gate.check(&ctx).is_render());
    }
}
