use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use tracing::warn;

use super::error::MongoDaoError;
use crate::dao::models::{MatchEntity, MatchFields, MatchStatus, StatusScan, parse_start_time};

/// Decode one stored match.
///
/// `dateTimeStart` may be a BSON date, an RFC 3339 string or null. A missing or
/// non-boolean `visible` reads as `false`.
pub fn decode_match(document: &Document) -> Result<MatchEntity, MongoDaoError> {
    let raw_id = document.get("_id");
    let invalid = |reason: String| MongoDaoError::InvalidDocument {
        id: raw_id.map_or_else(|| "<missing>".to_owned(), Bson::to_string),
        reason,
    };

    let id = raw_id
        .and_then(id_to_string)
        .ok_or_else(|| invalid("`_id` is neither an object id nor a string".into()))?;

    let status = document
        .get_str("status")
        .map_err(|_| invalid("missing string field `status`".into()))?
        .parse::<MatchStatus>()
        .map_err(|err| invalid(err.to_string()))?;

    let date_time_start = match document.get("dateTimeStart") {
        None | Some(Bson::Null) => None,
        Some(Bson::DateTime(start)) => Some(start.to_system_time()),
        Some(Bson::String(raw)) => Some(
            parse_start_time(raw)
                .map_err(|err| invalid(format!("invalid `dateTimeStart` `{raw}`: {err}")))?,
        ),
        Some(other) => return Err(invalid(format!("unsupported `dateTimeStart` value {other}"))),
    };

    Ok(MatchEntity {
        id,
        status,
        date_time_start,
        visible: document.get_bool("visible").unwrap_or(false),
    })
}

/// Decode every document, setting aside the ones that do not decode.
pub fn scan_documents(documents: &[Document]) -> StatusScan {
    let mut scan = StatusScan::default();
    for document in documents {
        match decode_match(document) {
            Ok(entity) => scan.matches.push(entity),
            Err(err) => {
                warn!(error = %err, "skipping undecodable match document");
                let id = match document.get("_id") {
                    Some(raw) => id_to_string(raw).unwrap_or_else(|| raw.to_string()),
                    None => "<missing>".to_owned(),
                };
                scan.invalid.push(id);
            }
        }
    }
    scan
}

/// Render a stored `_id` as the opaque identifier used by the services.
///
/// Only object ids and strings are addressable; other id types yield `None`.
pub fn id_to_string(id: &Bson) -> Option<String> {
    match id {
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(value) => Some(value.clone()),
        _ => None,
    }
}

/// Filter matching the document whose id renders as `id` in [`id_to_string`].
///
/// A 24-character hex id may come from an object id or from a plain string, so
/// both forms are matched.
pub fn doc_id(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! {"_id": {"$in": [oid, id]}},
        Err(_) => doc! {"_id": id},
    }
}

/// Filter selecting the matches currently in `status`.
pub fn status_filter(status: MatchStatus) -> Document {
    doc! {"status": status.as_str()}
}

/// `$set` update carrying only the fields present in the change set.
pub fn set_document(fields: &MatchFields) -> Document {
    let mut set = Document::new();
    if let Some(status) = fields.status {
        set.insert("status", status.as_str());
    }
    if let Some(visible) = fields.visible {
        set.insert("visible", visible);
    }
    doc! {"$set": set}
}
