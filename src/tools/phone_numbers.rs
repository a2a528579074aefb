//! Phone number inventory tools.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::gateway::registry::{
    get_bool_arg, get_filter_arg, get_int_arg, get_optional_string_arg, get_string_arg,
    reject_unknown_args, Arguments,
};
use crate::gateway::ToolDescriptor;
use crate::tool_schema;
use crate::twilio::format::{capabilities, clamp_limit, page_items, pick, validate_sid};
use crate::twilio::{validate_phone_number, TwilioClient};

pub const SEARCH_AVAILABLE_NUMBERS: &str = "twilio_search_available_numbers";
pub const PURCHASE_PHONE_NUMBER: &str = "twilio_purchase_phone_number";
pub const LIST_PHONE_NUMBERS: &str = "twilio_list_phone_numbers";
pub const UPDATE_PHONE_NUMBER: &str = "twilio_update_phone_number";
pub const RELEASE_PHONE_NUMBER: &str = "twilio_release_phone_number";

const MAX_SEARCH_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 1000;

const AVAILABLE_FIELDS: &[&str] = &[
    "phone_number",
    "friendly_name",
    "iso_country",
    "locality",
    "region",
    "postal_code",
];

const NUMBER_FIELDS: &[&str] = &[
    "sid",
    "phone_number",
    "friendly_name",
    "voice_url",
    "sms_url",
    "status_callback",
];

/// Optional webhook settings, argument name to Twilio form key.
const CONFIG_PARAMS: &[(&str, &str)] = &[
    ("friendly_name", "FriendlyName"),
    ("voice_url", "VoiceUrl"),
    ("sms_url", "SmsUrl"),
    ("status_callback", "StatusCallback"),
];

pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            SEARCH_AVAILABLE_NUMBERS,
            "Search for available phone numbers to purchase from Twilio. Use this to find numbers with specific area codes, capabilities (SMS/voice), or number patterns.",
            tool_schema!({
                "country_code": {
                    "type": "string",
                    "description": "Two-letter country code (default 'US')",
                    "default": "US"
                },
                "area_code": {
                    "type": "string",
                    "description": "Specific area code to search within (e.g., '415' for San Francisco)"
                },
                "contains": {
                    "type": "string",
                    "description": "Search for numbers containing specific digits"
                },
                "sms_enabled": {
                    "type": "boolean",
                    "description": "Filter for SMS-capable numbers (default true)"
                },
                "voice_enabled": {
                    "type": "boolean",
                    "description": "Filter for voice-capable numbers (default true)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default 20, max 50)"
                }
            }, []),
        ),
        ToolDescriptor::new(
            PURCHASE_PHONE_NUMBER,
            "Purchase an available phone number from Twilio. Use this after finding a suitable number with search_available_numbers. You can configure webhooks for incoming calls and messages.",
            tool_schema!({
                "phone_number": {
                    "type": "string",
                    "description": "Phone number to purchase in E.164 format"
                },
                "friendly_name": {
                    "type": "string",
                    "description": "A human-readable name for the number"
                },
                "voice_url": {
                    "type": "string",
                    "description": "URL to handle incoming voice calls"
                },
                "sms_url": {
                    "type": "string",
                    "description": "URL to handle incoming SMS messages"
                },
                "status_callback": {
                    "type": "string",
                    "description": "URL to receive status updates"
                }
            }, ["phone_number"]),
        ),
        ToolDescriptor::new(
            LIST_PHONE_NUMBERS,
            "List all phone numbers currently owned by your Twilio account. Use this to see your phone number inventory and their current configurations.",
            tool_schema!({
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of numbers to retrieve (default 20, max 1000)"
                }
            }, []),
        ),
        ToolDescriptor::new(
            UPDATE_PHONE_NUMBER,
            "Update the configuration of an existing phone number. Use this to change webhook URLs, friendly names, or other settings for numbers you own.",
            tool_schema!({
                "phone_number_sid": {
                    "type": "string",
                    "description": "SID of the phone number to update"
                },
                "friendly_name": {
                    "type": "string",
                    "description": "New friendly name for the number"
                },
                "voice_url": {
                    "type": "string",
                    "description": "New URL to handle incoming voice calls"
                },
                "sms_url": {
                    "type": "string",
                    "description": "New URL to handle incoming SMS messages"
                },
                "status_callback": {
                    "type": "string",
                    "description": "New URL to receive status updates"
                }
            }, ["phone_number_sid"]),
        ),
        ToolDescriptor::new(
            RELEASE_PHONE_NUMBER,
            "Release (delete) a phone number from your Twilio account. This permanently removes the number and stops all billing for it. Use with caution as this action cannot be undone.",
            tool_schema!({
                "phone_number_sid": {
                    "type": "string",
                    "description": "SID of the phone number to release"
                }
            }, ["phone_number_sid"]),
        ),
    ]
}

/// Owned-number record with normalised capabilities.
fn number_record(record: &Value, extra_fields: &[&str]) -> Value {
    let mut out = pick(record, NUMBER_FIELDS);
    out.insert("capabilities".into(), capabilities(record));
    out.extend(pick(record, extra_fields));
    Value::Object(out)
}

pub async fn search_available_numbers(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(
        &args,
        SEARCH_AVAILABLE_NUMBERS,
        &[
            "country_code",
            "area_code",
            "contains",
            "sms_enabled",
            "voice_enabled",
            "limit",
        ],
    )?;
    let country = get_optional_string_arg(&args, "country_code")?
        .unwrap_or_else(|| "US".to_string())
        .to_uppercase();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::invalid_args(format!(
            "Invalid country code: {}",
            country
        )));
    }
    let limit = clamp_limit(get_int_arg(&args, "limit", 20)?, MAX_SEARCH_LIMIT);
    let sms_enabled = get_bool_arg(&args, "sms_enabled", true)?;
    let voice_enabled = get_bool_arg(&args, "voice_enabled", true)?;

    let mut query = vec![
        ("PageSize", limit.to_string()),
        ("SmsEnabled", sms_enabled.to_string()),
        ("VoiceEnabled", voice_enabled.to_string()),
    ];
    let mut criteria = Map::new();
    criteria.insert("limit".into(), limit.into());
    criteria.insert("sms_enabled".into(), sms_enabled.into());
    criteria.insert("voice_enabled".into(), voice_enabled.into());

    if let Some(area_code) = get_filter_arg(&args, "area_code")? {
        query.push(("AreaCode", area_code.clone()));
        criteria.insert("area_code".into(), area_code.into());
    }
    if let Some(contains) = get_filter_arg(&args, "contains")? {
        query.push(("Contains", contains.clone()));
        criteria.insert("contains".into(), contains.into());
    }

    info!("Searching for available numbers in {}", country);

    let page = client
        .get(&format!("/AvailablePhoneNumbers/{}/Local.json", country), &query)
        .await?;
    let numbers: Vec<Value> = page_items(&page, "available_phone_numbers")
        .iter()
        .map(|n| {
            let mut out = pick(n, AVAILABLE_FIELDS);
            out.insert("capabilities".into(), capabilities(n));
            Value::Object(out)
        })
        .collect();

    Ok(json!({
        "count": numbers.len(),
        "available_numbers": numbers,
        "search_criteria": criteria,
        "country_code": country,
    }))
}

pub async fn purchase_phone_number(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(
        &args,
        PURCHASE_PHONE_NUMBER,
        &[
            "phone_number",
            "friendly_name",
            "voice_url",
            "sms_url",
            "status_callback",
        ],
    )?;
    let number = validate_phone_number(&get_string_arg(&args, "phone_number")?)?;

    let mut form = vec![("PhoneNumber", number.clone())];
    for (arg, key) in CONFIG_PARAMS {
        if let Some(value) = get_filter_arg(&args, arg)? {
            form.push((*key, value));
        }
    }

    info!("Purchasing phone number {}", number);

    let purchased = client.post_form("/IncomingPhoneNumbers.json", &form).await?;
    info!("Phone number purchased, sid {}", purchased["sid"]);
    Ok(number_record(&purchased, &["date_created"]))
}

pub async fn list_phone_numbers(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(&args, LIST_PHONE_NUMBERS, &["limit"])?;
    let limit = clamp_limit(get_int_arg(&args, "limit", 20)?, MAX_LIST_LIMIT);

    info!("Retrieving up to {} phone numbers", limit);

    let page = client
        .get(
            "/IncomingPhoneNumbers.json",
            &[("PageSize", limit.to_string())],
        )
        .await?;
    let numbers: Vec<Value> = page_items(&page, "incoming_phone_numbers")
        .iter()
        .map(|n| number_record(n, &["date_created", "date_updated"]))
        .collect();

    Ok(json!({
        "count": numbers.len(),
        "phone_numbers": numbers,
    }))
}

pub async fn update_phone_number(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(
        &args,
        UPDATE_PHONE_NUMBER,
        &[
            "phone_number_sid",
            "friendly_name",
            "voice_url",
            "sms_url",
            "status_callback",
        ],
    )?;
    let sid = get_string_arg(&args, "phone_number_sid")?;
    validate_sid("phone number SID", &sid)?;

    // An empty string is a valid update: it clears the setting.
    let mut form = Vec::new();
    for (arg, key) in CONFIG_PARAMS {
        if let Some(value) = get_optional_string_arg(&args, arg)? {
            form.push((*key, value));
        }
    }
    if form.is_empty() {
        return Err(Error::invalid_args(
            "At least one parameter must be provided to update",
        ));
    }

    info!("Updating phone number {}", sid);

    let updated = client
        .post_form(&format!("/IncomingPhoneNumbers/{}.json", sid), &form)
        .await?;
    Ok(number_record(&updated, &["date_updated"]))
}

pub async fn release_phone_number(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(&args, RELEASE_PHONE_NUMBER, &["phone_number_sid"])?;
    let sid = get_string_arg(&args, "phone_number_sid")?;
    validate_sid("phone number SID", &sid)?;

    info!("Releasing phone number {}", sid);

    let path = format!("/IncomingPhoneNumbers/{}.json", sid);
    let existing = client.get(&path, &[]).await?;
    let number = existing
        .get("phone_number")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    client.delete(&path).await?;
    info!("Phone number {} released", number);

    Ok(json!({
        "success": true,
        "message": format!("Phone number {} has been released", number),
        "released_number": number,
        "sid": sid,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_client() -> TwilioClient {
        TwilioClient::with_credentials(
            "http://127.0.0.1:9".to_string(),
            Some("AC_test".to_string()),
            Some("token".to_string()),
            Duration::from_millis(200),
        )
        .unwrap()
    }

    fn args(value: Value) -> Arguments {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_number_record() {
        let record = json!({
            "sid": "PN1",
            "phone_number": "+15550001111",
            "friendly_name": "Support",
            "capabilities": {"voice": true, "SMS": true, "MMS": true},
            "date_updated": "Wed, 03 Jan 2024 10:00:00 +0000"
        });
        let out = number_record(&record, &["date_updated"]);
        assert_eq!(out["sid"], "PN1");
        assert_eq!(out["voice_url"], Value::Null);
        assert_eq!(out["capabilities"]["mms"], true);
        assert_eq!(out["date_updated"], "2024-01-03T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_update_requires_a_field() {
        let err = update_phone_number(
            &offline_client(),
            args(json!({"phone_number_sid": "PN123"})),
        )
        .await
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("At least one parameter must be provided to update"));
    }

    #[tokio::test]
    async fn test_search_rejects_bad_country() {
        let err = search_available_numbers(&offline_client(), args(json!({"country_code": "U/S"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid country code"));
    }

    #[tokio::test]
    async fn test_purchase_validates_number() {
        let err = purchase_phone_number(&offline_client(), args(json!({"phone_number": ""})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Phone number cannot be empty"));
    }
}
