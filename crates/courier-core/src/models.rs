//! Core domain models and strongly-typed identifiers.
//!
//! Defines destinations, webhook events, delivery attempts, and newtype ID
//! wrappers for compile-time type safety. Includes database serialization
//! traits and the status vocabulary of the delivery lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed event identifier.
///
/// Wraps a UUID to prevent mixing with other ID types. The ID follows an
/// event through its whole lifecycle, including across retry cycles where
/// only the ID crosses the scheduling boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for EventId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for EventId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for EventId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed destination identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationId(pub Uuid);

impl DestinationId {
    /// Creates a new random destination ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DestinationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DestinationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for DestinationId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for DestinationId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for DestinationId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Event lifecycle status.
///
/// Transitions only move forward:
///
/// ```text
/// Pending -> Processing -> Success
///                       -> Failed
/// ```
///
/// `Processing` may be re-entered by a scheduled retry cycle; `Success` and
/// `Failed` are terminal and never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Created by ingestion, not yet claimed by a processing cycle.
    Pending,

    /// A processing cycle owns the event. Also the resting state between a
    /// failed attempt and its scheduled retry.
    Processing,

    /// Delivered and acknowledged with a 2xx response. Terminal.
    Success,

    /// Rejected by the receiver, destination inactive, or retries
    /// exhausted. Terminal.
    Failed,
}

impl EventStatus {
    /// Whether this status is terminal and must never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl sqlx::Type<PgDb> for EventStatus {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for EventStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid event status: {s}").into()),
        }
    }
}

impl sqlx::Encode<'_, PgDb> for EventStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// A registered delivery target.
///
/// Owns the shared signing secret for its webhooks. Destinations are
/// soft-disabled via `is_active` while events still reference them;
/// deleting one cascades to its events.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Destination {
    /// Unique identifier for this destination.
    pub id: DestinationId,

    /// Endpoint URL webhooks are POSTed to.
    ///
    /// Must be HTTP(S). The hostname may be a bare service name
    /// (`http://billing:8080/hooks`), not only a fully-qualified domain.
    pub url: String,

    /// Shared secret used to sign payloads. Immutable after creation and
    /// never serialized outward.
    #[serde(skip_serializing)]
    pub secret: String,

    /// Inactive destinations are never attempted and never retried.
    pub is_active: bool,

    /// When this destination was registered.
    pub created_at: DateTime<Utc>,
}

impl Destination {
    /// Validates a destination URL.
    ///
    /// Accepts any parseable HTTP(S) URL with a host, including bare
    /// service names used inside container networks.
    pub fn validate_url(url: &str) -> Result<(), CoreError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| CoreError::InvalidInput(format!("invalid destination url: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::InvalidInput(format!(
                "destination url must be http or https, got {}",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none() {
            return Err(CoreError::InvalidInput("destination url has no host".to_string()));
        }

        Ok(())
    }
}

/// One inbound occurrence queued for delivery to exactly one destination.
///
/// The payload is captured at ingestion and treated as immutable from then
/// on. Only the processing cycle mutates `status` and `attempts_count`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    /// Unique identifier for this event.
    pub id: EventId,

    /// Destination this event is delivered to.
    pub destination_id: DestinationId,

    /// The inbound JSON document, stored verbatim.
    pub payload: sqlx::types::Json<Value>,

    /// Current lifecycle status.
    pub status: EventStatus,

    /// Number of delivery attempts started for this event.
    ///
    /// Monotonically non-decreasing. Incremented exactly once per attempt,
    /// before the network call is made, so a crash mid-delivery is visible
    /// as a stuck `Processing` event with a counted attempt.
    pub attempts_count: i32,

    /// When the event was accepted by ingestion.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Creates a fresh pending event.
    pub fn new(
        id: EventId,
        destination_id: DestinationId,
        payload: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            destination_id,
            payload: sqlx::types::Json(payload),
            status: EventStatus::Pending,
            attempts_count: 0,
            created_at,
        }
    }

    /// The payload document.
    pub fn payload(&self) -> &Value {
        &self.payload.0
    }
}

/// Outcome classification of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The destination acknowledged with a 2xx response.
    Success,
    /// Anything else, including the `0` no-response sentinel.
    Failed,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl sqlx::Type<PgDb> for AttemptStatus {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for AttemptStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid attempt status: {s}").into()),
        }
    }
}

impl sqlx::Encode<'_, PgDb> for AttemptStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// Immutable log entry for one delivery try.
///
/// Append-only: one record per attempt, never mutated, deleted only when
/// the owning event cascades away.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliveryAttempt {
    /// Unique identifier for this attempt.
    pub id: Uuid,

    /// Event this attempt belongs to.
    pub event_id: EventId,

    /// Success (2xx) or failure classification.
    pub status: AttemptStatus,

    /// HTTP status code received, or `0` when no response arrived
    /// (timeout, refused connection, other transport fault).
    pub response_status_code: i32,

    /// Response body truncated to a bounded length, or a description of
    /// the transport fault. Absent when the response had no body.
    pub response_body: Option<String>,

    /// When the attempt completed.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_status_display_matches_database_vocabulary() {
        assert_eq!(EventStatus::Pending.to_string(), "pending");
        assert_eq!(EventStatus::Processing.to_string(), "processing");
        assert_eq!(EventStatus::Success.to_string(), "success");
        assert_eq!(EventStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn terminal_statuses_identified() {
        assert!(!EventStatus::Pending.is_terminal());
        assert!(!EventStatus::Processing.is_terminal());
        assert!(EventStatus::Success.is_terminal());
        assert!(EventStatus::Failed.is_terminal());
    }

    #[test]
    fn new_event_starts_pending_with_zero_attempts() {
        let event = Event::new(
            EventId::new(),
            DestinationId::new(),
            serde_json::json!({"kind": "order.created"}),
            Utc::now(),
        );

        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.attempts_count, 0);
    }

    #[test]
    fn destination_url_accepts_standard_and_service_name_hosts() {
        assert!(Destination::validate_url("https://example.com/hooks").is_ok());
        assert!(Destination::validate_url("http://localhost:8000/receive").is_ok());
        assert!(Destination::validate_url("http://web:8000").is_ok());
    }

    #[test]
    fn destination_url_rejects_non_http_schemes() {
        assert!(Destination::validate_url("ftp://example.com").is_err());
        assert!(Destination::validate_url("not a url").is_err());
    }

    #[test]
    fn destination_secret_never_serialized() {
        let destination = Destination {
            id: DestinationId::new(),
            url: "https://example.com/hooks".to_string(),
            secret: "top-secret".to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&destination).unwrap();
        assert!(!json.contains("top-secret"));
    }
}
