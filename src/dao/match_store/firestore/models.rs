use std::{collections::HashMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::dao::{
    match_store::firestore::error::FirestoreDaoError,
    models::{MatchEntity, MatchFields, MatchStatus, StatusScan, parse_start_time},
};

/// Maximum writes Firestore accepts in one commit.
pub const MAX_WRITES_PER_COMMIT: usize = 500;
/// Page size used when listing the whole collection.
pub const LIST_PAGE_SIZE: u32 = 300;

/// Stored document as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct FirestoreDocument {
    /// Full resource name, ending in the document id.
    pub name: String,
    /// Typed values keyed by field name (`{"stringValue": ...}` and friends).
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

/// Element of the streamed array returned by `:runQuery`.
#[derive(Debug, Deserialize)]
pub struct RunQueryItem {
    /// Absent on progress-only items.
    #[serde(default)]
    pub document: Option<FirestoreDocument>,
}

/// One page of a collection listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<FirestoreDocument>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of a `:commit` call; all writes apply or none do.
#[derive(Debug, Serialize)]
pub struct CommitRequest {
    pub writes: Vec<Write>,
}

/// Masked update of one document inside a commit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    pub update: WriteDocument,
    pub update_mask: DocumentMask,
    /// Rejects the whole commit when the document is gone.
    pub current_document: Precondition,
}

/// Target document name and the new field values.
#[derive(Debug, Serialize)]
pub struct WriteDocument {
    pub name: String,
    pub fields: HashMap<&'static str, Value>,
}

/// Fields a write touches; others are left untouched.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<&'static str>,
}

/// Condition the target document must satisfy for the commit to apply.
#[derive(Debug, Serialize)]
pub struct Precondition {
    pub exists: bool,
}

impl Write {
    /// Masked update of an existing document; fails the whole commit if it is missing.
    pub fn update(name: String, fields: &MatchFields) -> Self {
        let mut values = HashMap::new();
        if let Some(status) = fields.status {
            values.insert("status", json!({ "stringValue": status.as_str() }));
        }
        if let Some(visible) = fields.visible {
            values.insert("visible", json!({ "booleanValue": visible }));
        }

        Self {
            update: WriteDocument {
                name,
                fields: values,
            },
            update_mask: DocumentMask {
                field_paths: fields.field_paths(),
            },
            current_document: Precondition { exists: true },
        }
    }
}

/// Body of a `:runQuery` request filtering the collection on `status == value`.
pub fn status_query(collection: &str, status: MatchStatus) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "status" },
                    "op": "EQUAL",
                    "value": { "stringValue": status.as_str() }
                }
            }
        }
    })
}

/// Decode the documents of a `:runQuery` response, setting aside the ones that do not decode.
pub fn scan_query_results(items: Vec<RunQueryItem>) -> StatusScan {
    let mut scan = StatusScan::default();
    for document in items.into_iter().filter_map(|item| item.document) {
        let id = document.id().to_owned();
        match document.try_into_entity() {
            Ok(entity) => scan.matches.push(entity),
            Err(err) => {
                warn!(error = %err, "skipping undecodable match document");
                scan.invalid.push(id);
            }
        }
    }
    scan
}

impl FirestoreDocument {
    /// Last path segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Decode into the domain model. A missing or non-boolean `visible` reads as `false`.
    pub fn try_into_entity(self) -> Result<MatchEntity, FirestoreDaoError> {
        let status = self
            .fields
            .get("status")
            .and_then(|value| value.get("stringValue"))
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid("missing string field `status`"))?
            .parse::<MatchStatus>()
            .map_err(|err| self.invalid(err.to_string()))?;

        let date_time_start = match self.fields.get("dateTimeStart") {
            None => None,
            Some(value) => decode_timestamp(value).map_err(|reason| self.invalid(reason))?,
        };

        let visible = self
            .fields
            .get("visible")
            .and_then(|value| value.get("booleanValue"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(MatchEntity {
            id: self.id().to_owned(),
            status,
            date_time_start,
            visible,
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> FirestoreDaoError {
        FirestoreDaoError::InvalidDocument {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Decode `dateTimeStart`, stored either as a native timestamp or as an RFC 3339 string.
fn decode_timestamp(value: &Value) -> Result<Option<SystemTime>, String> {
    if value.get("nullValue").is_some() {
        return Ok(None);
    }

    let raw = value
        .get("timestampValue")
        .or_else(|| value.get("stringValue"))
        .and_then(Value::as_str)
        .ok_or_else(|| format!("unsupported `dateTimeStart` value {value}"))?;

    parse_start_time(raw)
        .map(Some)
        .map_err(|err| format!("invalid `dateTimeStart` `{raw}`: {err}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn document(fields: Value) -> FirestoreDocument {
        serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/matches/m42",
            "fields": fields,
        }))
        .unwrap()
    }

    #[test]
    fn decodes_native_timestamp_fields() {
        let entity = document(json!({
            "status": { "stringValue": "live" },
            "dateTimeStart": { "timestampValue": "2024-05-01T12:00:00Z" },
            "visible": { "booleanValue": true },
        }))
        .try_into_entity()
        .unwrap();

        assert_eq!(entity.id, "m42");
        assert_eq!(entity.status, MatchStatus::Live);
        assert!(entity.visible);
        assert_eq!(
            entity.date_time_start,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_714_564_800))
        );
    }

    #[test]
    fn accepts_string_start_and_missing_visibility() {
        let entity = document(json!({
            "status": { "stringValue": "open" },
            "dateTimeStart": { "stringValue": "2024-05-01T14:00:00+02:00" },
        }))
        .try_into_entity()
        .unwrap();

        assert!(!entity.visible);
        assert_eq!(
            entity.date_time_start,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_714_564_800))
        );
    }

    #[test]
    fn missing_start_is_not_an_error() {
        let entity = document(json!({ "status": { "stringValue": "open" } }))
            .try_into_entity()
            .unwrap();
        assert_eq!(entity.date_time_start, None);
    }

    #[test]
    fn unknown_status_is_an_invalid_document() {
        let err = document(json!({ "status": { "stringValue": "closed" } }))
            .try_into_entity()
            .unwrap_err();
        assert!(matches!(err, FirestoreDaoError::InvalidDocument { .. }));
    }

    #[test]
    fn bad_document_is_set_aside_next_to_good_one() {
        let items: Vec<RunQueryItem> = serde_json::from_value(json!([
            { "document": {
                "name": "projects/p/databases/(default)/documents/matches/good",
                "fields": { "status": { "stringValue": "open" } },
            }},
            { "document": {
                "name": "projects/p/databases/(default)/documents/matches/bad",
                "fields": {
                    "status": { "stringValue": "open" },
                    "dateTimeStart": { "integerValue": "1714564800" },
                },
            }},
            { "readTime": "2024-05-01T12:00:00Z" },
        ]))
        .unwrap();

        let scan = scan_query_results(items);
        assert_eq!(scan.matches.len(), 1);
        assert_eq!(scan.matches[0].id, "good");
        assert_eq!(scan.invalid, vec!["bad".to_owned()]);
    }

    #[test]
    fn reset_write_masks_both_fields_and_requires_existence() {
        let write = Write::update("doc".into(), &MatchFields::baseline());
        let encoded = serde_json::to_value(&write).unwrap();

        assert_eq!(
            encoded["update"]["fields"]["status"],
            json!({ "stringValue": "open" })
        );
        assert_eq!(
            encoded["update"]["fields"]["visible"],
            json!({ "booleanValue": true })
        );
        assert_eq!(encoded["updateMask"]["fieldPaths"], json!(["status", "visible"]));
        assert_eq!(encoded["currentDocument"], json!({ "exists": true }));
    }

    #[test]
    fn status_query_uses_equality_filter() {
        let query = status_query("matches", MatchStatus::Open);
        let filter = &query["structuredQuery"]["where"]["fieldFilter"];
        assert_eq!(filter["op"], "EQUAL");
        assert_eq!(filter["value"]["stringValue"], "open");
        assert_eq!(
            query["structuredQuery"]["from"][0]["collectionId"],
            "matches"
        );
    }
}
