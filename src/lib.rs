#![doc = include_str!("../README.md")]

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod gate;
pub mod navigation;
#[cfg(feature = "notifications")]
pub mod notifications;
pub mod oauth;
pub mod password;
#[cfg(feature = "resume")]
pub mod resume;
pub mod session;
pub mod toast;
pub mod types;

// Re-exports for convenient access
pub use api::{ApiClient, Envelope, Payload, RequestOptions};
pub use auth::{AuthGrant, Registration, SignIn};
pub use bootstrap::{BootstrapView, SessionBootstrap};
pub use config::{ClientConfig, RouteSettings};
pub use error::Error;
pub use gate::{DeniedRedirect, DenyReason, GateDecision, Gated, RouteGate};
pub use navigation::{MemoryHistory, Navigation, Navigator, PendingOAuthState};
#[cfg(feature = "notifications")]
pub use notifications::{
    Notification, NotificationKind, NotificationPage, PricingEvent, PricingEventType,
};
pub use oauth::{CodeExchange, is_valid_otp, sanitize_otp};
pub use password::{PasswordRule, PasswordRuleKey, is_password_valid, password_rules};
#[cfg(feature = "resume")]
pub use resume::{Resume, ResumeWidget};
pub use session::{JsonFileStorage, MemoryStorage, Session, SessionContext, SessionStorage};
pub use toast::{LogToaster, Toast, ToastLevel, ToastQueue, Toaster};
pub use types::{AccessToken, Role, User, UserId};
