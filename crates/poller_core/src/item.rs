use chrono::DateTime;
use serde_json::Value;
use thiserror::Error;

/// `created_at` layout used by the timeline API, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const TWITTER_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("feed item is not a JSON object")]
    NotAnObject,
    #[error("feed item has no usable `id_str` or `id`")]
    MissingId,
    #[error("feed item {id} has no `created_at`")]
    MissingCreatedAt { id: String },
    #[error("unparseable created_at {value:?}")]
    BadTimestamp { value: String },
}

/// One feed entry. `payload` is kept exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub created_at: String,
    pub created_timestamp: i64,
    pub payload: Value,
}

impl Item {
    /// Build an item from a raw feed object, deriving id and timestamp.
    pub fn from_payload(payload: Value) -> Result<Self, ItemError> {
        let object = payload.as_object().ok_or(ItemError::NotAnObject)?;

        let id = match (object.get("id_str"), object.get("id")) {
            (Some(Value::String(id)), _) if !id.is_empty() => id.clone(),
            (_, Some(Value::Number(id))) => id.to_string(),
            (_, Some(Value::String(id))) if !id.is_empty() => id.clone(),
            _ => return Err(ItemError::MissingId),
        };

        let created_at = object
            .get("created_at")
            .and_then(Value::as_str)
            .ok_or_else(|| ItemError::MissingCreatedAt { id: id.clone() })?
            .to_string();
        let created_timestamp = parse_created_at(&created_at)?;

        Ok(Self {
            id,
            created_at,
            created_timestamp,
            payload,
        })
    }

    /// Look up a top-level field of the payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Parse a feed timestamp into Unix seconds.
///
/// Accepts the timeline API layout first and RFC 3339 as a fallback.
pub fn parse_created_at(value: &str) -> Result<i64, ItemError> {
    let trimmed = value.trim();
    DateTime::parse_from_str(trimmed, TWITTER_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .map(|parsed| parsed.timestamp())
        .map_err(|_| ItemError::BadTimestamp {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_twitter_layout() {
        let ts = parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(ts, 1_539_202_764);
    }

    #[test]
    fn parses_rfc3339_fallback() {
        let ts = parse_created_at("2018-10-10T20:19:24Z").unwrap();
        assert_eq!(ts, 1_539_202_764);
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(matches!(
            parse_created_at("yesterday"),
            Err(ItemError::BadTimestamp { .. })
        ));
    }

    #[test]
    fn prefers_id_str_over_numeric_id() {
        let item = Item::from_payload(json!({
            "id": 1050118621198921728u64,
            "id_str": "1050118621198921728",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
        }))
        .unwrap();
        assert_eq!(item.id, "1050118621198921728");
    }

    #[test]
    fn numeric_id_is_accepted() {
        let item = Item::from_payload(json!({
            "id": 42,
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
        }))
        .unwrap();
        assert_eq!(item.id, "42");
    }

    #[test]
    fn missing_created_at_is_an_error() {
        let err = Item::from_payload(json!({ "id_str": "7" })).unwrap_err();
        assert_eq!(err, ItemError::MissingCreatedAt { id: "7".into() });
    }
}
