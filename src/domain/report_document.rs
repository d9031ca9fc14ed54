//! Upload document schema.
//!
//! An uploaded report must be a single JSON object:
//!
//! ```json
//! {
//!   "drone_id": "D1",
//!   "date": "2024-01-01",
//!   "location": "North gate",
//!   "violations": [
//!     {
//!       "id": "v1",
//!       "type": "speed",
//!       "timestamp": "10:00:00",
//!       "latitude": 1.0,
//!       "longitude": 2.0,
//!       "image_url": "https://cdn.example/v1.jpg"
//!     }
//!   ]
//! }
//! ```
//!
//! Validation walks the fields in the order above and stops at the first
//! failure; the error message names that field (`"violations[3].image_url"`).
//! Keys outside the schema are rejected after the known keys of the same
//! object have been checked.

use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};

use super::filter::DATE_FORMAT;
use super::report::{NewReport, NewViolation, TEXT_COLUMN_MAX};
use super::UserId;
use crate::error::ApiError;

const REPORT_KEYS: [&str; 4] = ["drone_id", "date", "location", "violations"];
const VIOLATION_KEYS: [&str; 6] = ["id", "type", "timestamp", "latitude", "longitude", "image_url"];

/// A schema-valid upload, not yet attributed to an uploader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    /// Drone that produced the report.
    pub drone_id: String,
    /// Calendar date of the flight.
    pub date: NaiveDate,
    /// Location name.
    pub location: String,
    /// Violations in document order.
    pub violations: Vec<NewViolation>,
}

impl ReportDocument {
    /// Decodes and validates raw upload bytes.
    ///
    /// # Errors
    ///
    /// - [`ApiError::EmptyPayload`] when `raw` has zero length.
    /// - [`ApiError::MalformedJson`] when `raw` is not valid JSON.
    /// - [`ApiError::SchemaViolation`] naming the first offending field.
    pub fn from_slice(raw: &[u8]) -> Result<Self, ApiError> {
        if raw.is_empty() {
            return Err(ApiError::EmptyPayload);
        }
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| ApiError::MalformedJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Validates an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::SchemaViolation`] naming the first offending field.
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        let Some(root) = value.as_object() else {
            return Err(violation("value", "must be of type object"));
        };
        let fields = Fields::root(root);

        let drone_id = fields.column_string("drone_id")?;
        let date_raw = fields.string("date")?;
        let date = NaiveDate::parse_from_str(&date_raw, DATE_FORMAT)
            .map_err(|_| violation("date", "must be a valid date (YYYY-MM-DD)"))?;
        let location = fields.column_string("location")?;
        let items = fields.array("violations")?;

        let mut violations = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            violations.push(parse_violation(index, item)?);
        }

        fields.reject_unknown(&REPORT_KEYS)?;

        Ok(Self {
            drone_id,
            date,
            location,
            violations,
        })
    }

    /// Attaches the uploader, producing the row set to persist.
    #[must_use]
    pub fn attribute_to(self, uploader: UserId) -> NewReport {
        NewReport {
            drone_id: self.drone_id,
            date: self.date,
            location: self.location,
            uploaded_by: uploader,
            violations: self.violations,
        }
    }
}

fn parse_violation(index: usize, item: &Value) -> Result<NewViolation, ApiError> {
    let prefix = format!("violations[{index}]");
    let Some(obj) = item.as_object() else {
        return Err(violation(&prefix, "must be of type object"));
    };
    let fields = Fields::nested(obj, &prefix);

    let violation_id = fields.column_string("id")?;
    let violation_type = fields.column_string("type")?;
    let timestamp_raw = fields.string("timestamp")?;
    let timestamp = parse_time_of_day(&timestamp_raw).ok_or_else(|| {
        violation(
            &fields.path("timestamp"),
            "must be a valid time of day (HH:MM[:SS])",
        )
    })?;
    let latitude = fields.number("latitude")?;
    let longitude = fields.number("longitude")?;
    let image_url = fields.string("image_url")?;
    if url::Url::parse(&image_url).is_err() {
        return Err(violation(&fields.path("image_url"), "must be a valid uri"));
    }

    fields.reject_unknown(&VIOLATION_KEYS)?;

    Ok(NewViolation {
        violation_id,
        violation_type,
        timestamp,
        latitude,
        longitude,
        image_url,
    })
}

/// Accepts `HH:MM:SS`, `HH:MM:SS.fff` and `HH:MM`.
fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn violation(path: &str, rule: &str) -> ApiError {
    ApiError::SchemaViolation(format!("\"{path}\" {rule}"))
}

/// Typed accessors over one JSON object, producing path-qualified errors.
struct Fields<'a> {
    obj: &'a Map<String, Value>,
    prefix: Option<&'a str>,
}

impl<'a> Fields<'a> {
    const fn root(obj: &'a Map<String, Value>) -> Self {
        Self { obj, prefix: None }
    }

    const fn nested(obj: &'a Map<String, Value>, prefix: &'a str) -> Self {
        Self {
            obj,
            prefix: Some(prefix),
        }
    }

    fn path(&self, key: &str) -> String {
        match self.prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        }
    }

    fn required(&self, key: &str) -> Result<&'a Value, ApiError> {
        self.obj
            .get(key)
            .ok_or_else(|| violation(&self.path(key), "is required"))
    }

    fn string(&self, key: &str) -> Result<String, ApiError> {
        match self.required(key)? {
            Value::String(s) if s.is_empty() => {
                Err(violation(&self.path(key), "is not allowed to be empty"))
            }
            Value::String(s) => Ok(s.clone()),
            _ => Err(violation(&self.path(key), "must be a string")),
        }
    }

    /// A string bound for a `VARCHAR(255)` column.
    fn column_string(&self, key: &str) -> Result<String, ApiError> {
        let value = self.string(key)?;
        if value.chars().count() > TEXT_COLUMN_MAX {
            return Err(violation(
                &self.path(key),
                &format!("length must be less than or equal to {TEXT_COLUMN_MAX} characters long"),
            ));
        }
        Ok(value)
    }

    /// Numbers may also arrive as numeric strings (`"12.5"`).
    fn number(&self, key: &str) -> Result<f64, ApiError> {
        let parsed = match self.required(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|n| n.is_finite())
            .ok_or_else(|| violation(&self.path(key), "must be a number"))
    }

    fn array(&self, key: &str) -> Result<&'a Vec<Value>, ApiError> {
        self.required(key)?
            .as_array()
            .ok_or_else(|| violation(&self.path(key), "must be an array"))
    }

    fn reject_unknown(&self, allowed: &[&str]) -> Result<(), ApiError> {
        match self.obj.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(violation(&self.path(key), "is not allowed")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "drone_id": "D1",
            "date": "2024-01-01",
            "location": "L1",
            "violations": [{
                "id": "v1",
                "type": "speed",
                "timestamp": "10:00:00",
                "latitude": 1.0,
                "longitude": 2.0,
                "image_url": "https://x/y.jpg"
            }]
        })
    }

    fn schema_message(value: &Value) -> String {
        match ReportDocument::from_value(value) {
            Err(ApiError::SchemaViolation(msg)) => msg,
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_document() {
        let Ok(doc) = ReportDocument::from_value(&valid_document()) else {
            panic!("valid document rejected");
        };
        assert_eq!(doc.drone_id, "D1");
        assert_eq!(doc.location, "L1");
        assert_eq!(doc.violations.len(), 1);
        let Some(first) = doc.violations.first() else {
            panic!("missing violation");
        };
        assert_eq!(first.violation_type, "speed");
        assert_eq!(first.timestamp, NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default());
    }

    #[test]
    fn accepts_empty_violation_array() {
        let mut doc = valid_document();
        doc["violations"] = json!([]);
        let Ok(parsed) = ReportDocument::from_value(&doc) else {
            panic!("empty array rejected");
        };
        assert!(parsed.violations.is_empty());
    }

    #[test]
    fn empty_bytes_are_empty_payload() {
        assert!(matches!(
            ReportDocument::from_slice(b""),
            Err(ApiError::EmptyPayload)
        ));
    }

    #[test]
    fn broken_json_is_malformed() {
        assert!(matches!(
            ReportDocument::from_slice(b"{\"drone_id\": "),
            Err(ApiError::MalformedJson(_))
        ));
    }

    #[test]
    fn arrays_and_scalars_are_not_documents() {
        assert_eq!(schema_message(&json!([])), "\"value\" must be of type object");
        assert_eq!(schema_message(&json!(42)), "\"value\" must be of type object");
    }

    #[test]
    fn reports_first_missing_field_only() {
        let doc = json!({ "location": "L1" });
        assert_eq!(schema_message(&doc), "\"drone_id\" is required");
    }

    #[test]
    fn mistyped_field_is_named() {
        let mut doc = valid_document();
        doc["violations"] = json!("none");
        assert_eq!(schema_message(&doc), "\"violations\" must be an array");
    }

    #[test]
    fn nested_fields_carry_their_index() {
        let mut doc = valid_document();
        doc["violations"] = json!([
            {
                "id": "v1", "type": "speed", "timestamp": "10:00:00",
                "latitude": 1.0, "longitude": 2.0, "image_url": "https://x/1.jpg"
            },
            {
                "id": "v2", "type": "speed", "timestamp": "10:00:00",
                "latitude": "north", "longitude": 2.0, "image_url": "not a uri"
            }
        ]);
        assert_eq!(
            schema_message(&doc),
            "\"violations[1].latitude\" must be a number"
        );
    }

    #[test]
    fn image_url_must_be_a_uri() {
        let mut doc = valid_document();
        doc["violations"][0]["image_url"] = json!("images/v1.jpg");
        assert_eq!(
            schema_message(&doc),
            "\"violations[0].image_url\" must be a valid uri"
        );
    }

    #[test]
    fn numeric_strings_are_accepted_for_coordinates() {
        let mut doc = valid_document();
        doc["violations"][0]["latitude"] = json!("12.5");
        let Ok(parsed) = ReportDocument::from_value(&doc) else {
            panic!("numeric string rejected");
        };
        let Some(first) = parsed.violations.first() else {
            panic!("missing violation");
        };
        assert!((first.latitude - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn date_and_time_formats_are_checked() {
        let mut doc = valid_document();
        doc["date"] = json!("yesterday");
        assert_eq!(
            schema_message(&doc),
            "\"date\" must be a valid date (YYYY-MM-DD)"
        );

        let mut doc = valid_document();
        doc["violations"][0]["timestamp"] = json!("25:61");
        assert!(schema_message(&doc).starts_with("\"violations[0].timestamp\""));

        let mut doc = valid_document();
        doc["violations"][0]["timestamp"] = json!("09:30");
        assert!(ReportDocument::from_value(&doc).is_ok());
    }

    #[test]
    fn empty_strings_are_rejected() {
        let mut doc = valid_document();
        doc["location"] = json!("");
        assert_eq!(schema_message(&doc), "\"location\" is not allowed to be empty");
    }

    #[test]
    fn column_strings_are_capped_at_255_characters() {
        let mut doc = valid_document();
        doc["drone_id"] = json!("d".repeat(255));
        assert!(ReportDocument::from_value(&doc).is_ok());

        doc["drone_id"] = json!("d".repeat(256));
        assert_eq!(
            schema_message(&doc),
            "\"drone_id\" length must be less than or equal to 255 characters long"
        );

        let mut doc = valid_document();
        doc["violations"][0]["type"] = json!("é".repeat(255));
        assert!(ReportDocument::from_value(&doc).is_ok());
        doc["violations"][0]["type"] = json!("é".repeat(256));
        assert_eq!(
            schema_message(&doc),
            "\"violations[0].type\" length must be less than or equal to 255 characters long"
        );
    }

    #[test]
    fn unknown_keys_are_rejected_after_known_ones() {
        let mut doc = valid_document();
        doc["operator"] = json!("alice");
        assert_eq!(schema_message(&doc), "\"operator\" is not allowed");

        let mut doc = valid_document();
        doc["violations"][0]["severity"] = json!(3);
        assert_eq!(schema_message(&doc), "\"violations[0].severity\" is not allowed");
    }

    #[test]
    fn attribution_keeps_document_order() {
        let mut doc = valid_document();
        doc["violations"] = json!([
            { "id": "a", "type": "t", "timestamp": "09:00", "latitude": 0, "longitude": 0, "image_url": "https://x/a" },
            { "id": "b", "type": "t", "timestamp": "11:00", "latitude": 0, "longitude": 0, "image_url": "https://x/b" }
        ]);
        let Ok(parsed) = ReportDocument::from_value(&doc) else {
            panic!("document rejected");
        };
        let report = parsed.attribute_to(UserId::new(9));
        assert_eq!(report.uploaded_by, UserId::new(9));
        let ids: Vec<&str> = report
            .violations
            .iter()
            .map(|v| v.violation_id.as_str())
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
