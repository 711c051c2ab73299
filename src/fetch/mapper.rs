//! Raw search result → [`TweetRecord`].

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::MalformedRecordError;
use crate::twitter::types::{RawEnvelope, TweetRecord};

/// `created_at` format of the v1.1 API, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Normalize one envelope. Pure.
pub fn map_envelope(envelope: &RawEnvelope) -> Result<TweetRecord, MalformedRecordError> {
    let status = &envelope.status;

    let tweet_id = storable_id(status.get("id"), "id")?;
    let user = status.get("user");
    let author = user
        .and_then(|u| u.get("screen_name"))
        .and_then(Value::as_str)
        .ok_or(MalformedRecordError::MissingField("user.screen_name"))?;
    let author_id = storable_id(user.and_then(|u| u.get("id")), "user.id")?;

    let text = status
        .get("text")
        .or_else(|| status.get("full_text"))
        .and_then(Value::as_str)
        .ok_or(MalformedRecordError::MissingField("text"))?;

    let created_at = status
        .get("created_at")
        .and_then(Value::as_str)
        .ok_or(MalformedRecordError::MissingField("created_at"))?;
    let posted_at = parse_created_at(created_at)?;

    let source_query = Value::Object(
        envelope
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    );

    Ok(TweetRecord {
        tweet_id,
        author: author.to_string(),
        author_id,
        text: text.to_string(),
        posted_at,
        raw_payload: status.to_string(),
        source_query: source_query.to_string(),
    })
}

/// Map a batch, dropping (and logging) malformed records.
///
/// Returns the records and the number of envelopes dropped.
pub fn map_all(envelopes: &[RawEnvelope]) -> (Vec<TweetRecord>, usize) {
    let mut records = Vec::with_capacity(envelopes.len());
    let mut malformed = 0;

    for envelope in envelopes {
        match map_envelope(envelope) {
            Ok(record) => records.push(record),
            Err(e) => {
                malformed += 1;
                log::warn!(
                    "⚠️  Dropping malformed tweet {}: {}",
                    envelope.status.get("id").map(Value::to_string).unwrap_or_default(),
                    e
                );
            }
        }
    }

    (records, malformed)
}

pub fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, MalformedRecordError> {
    DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| MalformedRecordError::BadTimestamp(raw.to_string()))
}

// SQLite integers are signed 64-bit.
fn storable_id(value: Option<&Value>, field: &'static str) -> Result<u64, MalformedRecordError> {
    let id = value
        .and_then(Value::as_u64)
        .ok_or(MalformedRecordError::MissingField(field))?;
    if i64::try_from(id).is_err() {
        return Err(MalformedRecordError::IdOutOfRange(id));
    }
    Ok(id)
}
