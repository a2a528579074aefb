//! Validation and response shaping shared by the tool handlers.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Normalise a phone number to E.164.
///
/// Everything except digits and `+` is stripped. Bare 10-digit numbers are
/// assumed to be North American.
pub fn validate_phone_number(phone_number: &str) -> Result<String> {
    if phone_number.is_empty() {
        return Err(Error::invalid_args("Phone number cannot be empty"));
    }

    let cleaned: String = phone_number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if cleaned.starts_with('+') {
        return Ok(cleaned);
    }
    if cleaned.len() == 11 && cleaned.starts_with('1') {
        return Ok(format!("+{}", cleaned));
    }
    if cleaned.len() == 10 {
        return Ok(format!("+1{}", cleaned));
    }
    Err(Error::invalid_args(format!(
        "Invalid phone number format: {}",
        phone_number
    )))
}

/// Check that a resource SID is safe to place in a URL path.
pub fn validate_sid(kind: &str, sid: &str) -> Result<()> {
    if sid.is_empty() || !sid.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::invalid_args(format!("Invalid {}: {:?}", kind, sid)));
    }
    Ok(())
}

/// Clamp a requested page size into `1..=max`.
pub fn clamp_limit(limit: i64, max: i64) -> i64 {
    limit.clamp(1, max)
}

/// RFC 2822 timestamps as RFC 3339; anything unparseable passes through.
pub fn iso_timestamp(value: &Value) -> Value {
    match value.as_str().map(DateTime::parse_from_rfc2822) {
        Some(Ok(ts)) => Value::String(ts.to_rfc3339()),
        _ => value.clone(),
    }
}

fn is_timestamp_field(field: &str) -> bool {
    field.starts_with("date_") || field == "start_time" || field == "end_time"
}

/// Copy `fields` out of a Twilio record, converting timestamps.
///
/// Missing fields come out as `null`.
pub fn pick(record: &Value, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .map(|&field| {
            let value = record.get(field).cloned().unwrap_or(Value::Null);
            let value = if is_timestamp_field(field) {
                iso_timestamp(&value)
            } else {
                value
            };
            (field.to_string(), value)
        })
        .collect()
}

/// Normalised `{voice, sms, mms, fax}` capability flags.
pub fn capabilities(record: &Value) -> Value {
    let caps = record.get("capabilities");
    let flag = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| caps.and_then(|c| c.get(*k)).and_then(Value::as_bool))
            .unwrap_or(false)
    };
    serde_json::json!({
        "voice": flag(&["voice"]),
        "sms": flag(&["SMS", "sms"]),
        "mms": flag(&["MMS", "mms"]),
        "fax": flag(&["fax"]),
    })
}

/// The array stored under `key` in a list response page.
pub fn page_items(page: &Value, key: &str) -> Vec<Value> {
    page.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// A numeric field that Twilio may send as a string.
pub fn number_field(record: &Value, field: &str) -> Option<f64> {
    match record.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_phone_number() {
        assert_eq!(validate_phone_number("+1 (555) 123-4567").unwrap(), "+15551234567");
        assert_eq!(validate_phone_number("15551234567").unwrap(), "+15551234567");
        assert_eq!(validate_phone_number("555-123-4567").unwrap(), "+15551234567");
        assert_eq!(validate_phone_number("+447700900123").unwrap(), "+447700900123");
    }

    #[test]
    fn test_validate_phone_number_errors() {
        let err = validate_phone_number("").unwrap_err();
        assert!(err.to_string().contains("Phone number cannot be empty"));

        let err = validate_phone_number("12345").unwrap_err();
        assert!(err.to_string().contains("Invalid phone number format: 12345"));
    }

    #[test]
    fn test_validate_sid() {
        assert!(validate_sid("message SID", "SM0123456789abcdef").is_ok());
        assert!(validate_sid("message SID", "").is_err());
        assert!(validate_sid("message SID", "../Balance").is_err());
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(5000, 1000), 1000);
        assert_eq!(clamp_limit(20, 1000), 20);
        assert_eq!(clamp_limit(0, 50), 1);
    }

    #[test]
    fn test_iso_timestamp() {
        let converted = iso_timestamp(&json!("Tue, 02 Jan 2024 15:04:05 +0000"));
        assert_eq!(converted, json!("2024-01-02T15:04:05+00:00"));
        assert_eq!(iso_timestamp(&Value::Null), Value::Null);
        assert_eq!(iso_timestamp(&json!("2024-01-02")), json!("2024-01-02"));
    }

    #[test]
    fn test_pick() {
        let record = json!({
            "sid": "SM1",
            "status": "queued",
            "date_created": "Tue, 02 Jan 2024 15:04:05 +0000",
            "ignored": true
        });
        let picked = pick(&record, &["sid", "status", "date_created", "price"]);
        assert_eq!(picked.len(), 4);
        assert_eq!(picked["sid"], "SM1");
        assert_eq!(picked["date_created"], "2024-01-02T15:04:05+00:00");
        assert_eq!(picked["price"], Value::Null);
        assert!(!picked.contains_key("ignored"));
    }

    #[test]
    fn test_capabilities() {
        let record = json!({"capabilities": {"voice": true, "SMS": true, "MMS": false}});
        assert_eq!(
            capabilities(&record),
            json!({"voice": true, "sms": true, "mms": false, "fax": false})
        );
        assert_eq!(
            capabilities(&json!({})),
            json!({"voice": false, "sms": false, "mms": false, "fax": false})
        );
    }

    #[test]
    fn test_number_field() {
        let record = json!({"price": "-0.0075", "count": 3, "usage": "n/a"});
        assert_eq!(number_field(&record, "price"), Some(-0.0075));
        assert_eq!(number_field(&record, "count"), Some(3.0));
        assert_eq!(number_field(&record, "usage"), None);
        assert_eq!(number_field(&record, "missing"), None);
    }
}
