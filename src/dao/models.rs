use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use utoipa::ToSchema;

/// Lifecycle status of a match as persisted in the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Bets are accepted; the match has not started yet.
    Open,
    /// The scheduled start has passed.
    Live,
    /// The match is over; no further transitions happen.
    Expired,
}

impl MatchStatus {
    /// Wire representation stored in the document.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Open => "open",
            MatchStatus::Live => "live",
            MatchStatus::Expired => "expired",
        }
    }

    /// Whether the lifecycle engine may move a match from `self` to `next`.
    ///
    /// Only single forward steps are allowed. The force reset bypasses this rule.
    pub fn can_advance_to(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Open, MatchStatus::Live) | (MatchStatus::Live, MatchStatus::Expired)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not part of the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown match status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for MatchStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(MatchStatus::Open),
            "live" => Ok(MatchStatus::Live),
            "expired" => Ok(MatchStatus::Expired),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Snapshot of a match document, independent of the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEntity {
    /// Identifier assigned by the store.
    pub id: String,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Scheduled kick-off. Matches without one never transition.
    pub date_time_start: Option<SystemTime>,
    /// Whether clients display the match.
    pub visible: bool,
}

/// Partial document written by an update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFields {
    /// New lifecycle status.
    pub status: Option<MatchStatus>,
    /// New visibility flag.
    pub visible: Option<bool>,
}

impl MatchFields {
    /// Change only the status field.
    pub fn status(status: MatchStatus) -> Self {
        Self {
            status: Some(status),
            visible: None,
        }
    }

    /// Baseline written by the force reset: visible and open.
    pub fn baseline() -> Self {
        Self {
            status: Some(MatchStatus::Open),
            visible: Some(true),
        }
    }

    /// Names of the fields carried by this change set, using the document field names.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::with_capacity(2);
        if self.status.is_some() {
            paths.push("status");
        }
        if self.visible.is_some() {
            paths.push("visible");
        }
        paths
    }

    /// Apply the change set to an in-memory snapshot.
    pub fn apply_to(&self, entity: &mut MatchEntity) {
        if let Some(status) = self.status {
            entity.status = status;
        }
        if let Some(visible) = self.visible {
            entity.visible = visible;
        }
    }
}

/// A field change staged against one match document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchUpdate {
    /// Identifier of the targeted match, as returned by the store.
    pub id: String,
    /// Fields overwritten on that match.
    pub fields: MatchFields,
}

impl MatchUpdate {
    /// Stage `fields` against the match `id`.
    pub fn new(id: impl Into<String>, fields: MatchFields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Matches returned by a status query.
///
/// Documents that satisfy the filter but cannot be decoded are reported by
/// identifier instead of failing the whole query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusScan {
    /// Decoded candidates.
    pub matches: Vec<MatchEntity>,
    /// Identifiers of the documents that could not be decoded.
    pub invalid: Vec<String>,
}

/// Parse a start time stored as an RFC 3339 string.
pub fn parse_start_time(raw: &str) -> Result<SystemTime, time::error::Parse> {
    OffsetDateTime::parse(raw, &Rfc3339).map(SystemTime::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_name() {
        for status in [MatchStatus::Open, MatchStatus::Live, MatchStatus::Expired] {
            assert_eq!(status.as_str().parse::<MatchStatus>(), Ok(status));
        }
        assert_eq!(
            serde_json::to_string(&MatchStatus::Live).unwrap(),
            "\"live\""
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "closed".parse::<MatchStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("closed".into()));
    }

    #[test]
    fn lifecycle_only_moves_forward_one_step() {
        assert!(MatchStatus::Open.can_advance_to(MatchStatus::Live));
        assert!(MatchStatus::Live.can_advance_to(MatchStatus::Expired));
        assert!(!MatchStatus::Open.can_advance_to(MatchStatus::Expired));
        assert!(!MatchStatus::Live.can_advance_to(MatchStatus::Open));
        assert!(!MatchStatus::Expired.can_advance_to(MatchStatus::Open));
        assert!(!MatchStatus::Expired.can_advance_to(MatchStatus::Live));
    }

    #[test]
    fn start_time_accepts_offsets_and_rejects_garbage() {
        let utc = parse_start_time("2024-05-01T12:00:00Z").unwrap();
        let offset = parse_start_time("2024-05-01T14:00:00+02:00").unwrap();
        assert_eq!(utc, offset);
        assert!(parse_start_time("tomorrow").is_err());
    }

    #[test]
    fn baseline_fields_touch_status_and_visibility() {
        let mut entity = MatchEntity {
            id: "m1".into(),
            status: MatchStatus::Expired,
            date_time_start: None,
            visible: false,
        };
        let fields = MatchFields::baseline();
        fields.apply_to(&mut entity);

        assert_eq!(entity.status, MatchStatus::Open);
        assert!(entity.visible);
        assert_eq!(fields.field_paths(), vec!["status", "visible"]);
        assert_eq!(
            MatchFields::status(MatchStatus::Live).field_paths(),
            vec!["status"]
        );
    }
}
