use reqwest::Method;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::api::{ApiClient, Payload, RequestOptions};
use crate::error::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JobRecommendation,
    ApplicationStatus,
    SavedJobExpiry,
    Pricing,
    System,
    /// Sent by a newer server than this client knows about.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(rename = "ctaPath", default)]
    pub cta_path: Option<String>,
    #[serde(rename = "ctaLabel", default)]
    pub cta_label: Option<String>,
    #[serde(rename = "readAt", default, with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    /// `None` when the server sent no timestamp or one that is not RFC 3339.
    #[serde(rename = "createdAt", default, deserialize_with = "lenient_rfc3339")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

fn lenient_rfc3339<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| OffsetDateTime::parse(&s, &Rfc3339).ok()))
}

impl Notification {
    /// True until the user has opened it.
    #[must_use]
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

/// One page of the signed-in user's notifications.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingEventType {
    ViewPricing,
    SelectPlan,
    CheckoutIntent,
}

/// Pricing-page activity reported so the server can generate follow-ups.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingEvent {
    pub event_type: PricingEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
}

impl PricingEvent {
    /// Event without plan details.
    #[must_use]
    pub fn new(event_type: PricingEventType) -> Self {
        Self {
            event_type,
            plan_id: None,
            plan_name: None,
        }
    }

    /// Attach the plan the user interacted with.
    #[must_use]
    pub fn with_plan(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.plan_id = Some(id.into());
        self.plan_name = Some(name.into());
        self
    }
}

#[derive(Deserialize)]
struct ListBody {
    #[serde(default)]
    data: Option<ListData>,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    items: Option<Vec<Notification>>,
    #[serde(rename = "unreadCount", default)]
    unread_count: Option<u64>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn list_notifications(&self, limit: u32) -> Result<NotificationPage, Error> {
        let body: ListBody = self
            .get(&format!("/api/notifications/mine?limit={limit}"))
            .await?;
        let (items, unread_count) = body
            .data
            .map_or((None, None), |d| (d.items, d.unread_count));
        Ok(NotificationPage {
            items: items.unwrap_or_default(),
            unread_count: unread_count.unwrap_or(0),
        })
    }

    /// # Errors
    ///
    /// Returns the API error.
    pub async fn mark_notification_read(&self, id: &str) -> Result<(), Error> {
        let path = format!("/api/notifications/{}/read", urlencoding::encode(id));
        let _: IgnoredAny = self.patch(&path).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the API error.
    pub async fn mark_all_notifications_read(&self) -> Result<(), Error> {
        let _: IgnoredAny = self.patch("/api/notifications/read-all").await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the API error.
    pub async fn record_pricing_event(&self, event: &PricingEvent) -> Result<(), Error> {
        let _: IgnoredAny = self
            .request(
                Method::POST,
                "/api/notifications/events/pricing",
                Payload::json(event)?,
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }
}
