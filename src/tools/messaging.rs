//! SMS and MMS tools.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::gateway::registry::{
    get_filter_arg, get_int_arg, get_optional_string_arg, get_string_arg, get_string_array_arg,
    reject_unknown_args, Arguments,
};
use crate::gateway::ToolDescriptor;
use crate::tool_schema;
use crate::twilio::format::{clamp_limit, page_items, pick, validate_sid};
use crate::twilio::{validate_phone_number, TwilioClient};

pub const SEND_SMS: &str = "twilio_send_sms";
pub const SEND_MMS: &str = "twilio_send_mms";
pub const GET_MESSAGES: &str = "twilio_get_messages";
pub const GET_MESSAGE_BY_SID: &str = "twilio_get_message_by_sid";

/// Longest body Twilio accepts for one message.
pub const MAX_BODY_CHARS: usize = 1600;
/// Media attachments allowed per MMS.
pub const MAX_MEDIA: usize = 10;
const MAX_LIST_LIMIT: i64 = 1000;

const SENT_FIELDS: &[&str] = &[
    "sid",
    "status",
    "direction",
    "to",
    "body",
    "num_segments",
    "price",
    "price_unit",
    "date_created",
    "date_sent",
];

const MMS_FIELDS: &[&str] = &[
    "sid",
    "status",
    "direction",
    "to",
    "body",
    "num_media",
    "num_segments",
    "price",
    "price_unit",
    "date_created",
    "date_sent",
];

const LIST_FIELDS: &[&str] = &[
    "sid",
    "status",
    "direction",
    "to",
    "body",
    "num_segments",
    "num_media",
    "price",
    "price_unit",
    "date_created",
    "date_sent",
];

const DETAIL_FIELDS: &[&str] = &[
    "sid",
    "status",
    "direction",
    "to",
    "body",
    "num_segments",
    "num_media",
    "price",
    "price_unit",
    "error_code",
    "error_message",
    "date_created",
    "date_sent",
    "date_updated",
];

pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            SEND_SMS,
            "Send an SMS message to a phone number using Twilio. Perfect for sending text notifications, alerts, or confirmations to users.",
            tool_schema!({
                "to": {
                    "type": "string",
                    "description": "Recipient phone number in E.164 format (e.g., +1234567890)"
                },
                "from_": {
                    "type": "string",
                    "description": "Sender phone number (must be a Twilio phone number you own)"
                },
                "body": {
                    "type": "string",
                    "description": "Message content (up to 1600 characters)"
                },
                "status_callback": {
                    "type": "string",
                    "description": "Optional webhook URL to receive delivery status updates"
                }
            }, ["to", "from_", "body"]),
        ),
        ToolDescriptor::new(
            SEND_MMS,
            "Send an MMS message with media attachments (images, videos, PDFs) using Twilio. Use this when you need to send visual content along with or instead of text.",
            tool_schema!({
                "to": {
                    "type": "string",
                    "description": "Recipient phone number in E.164 format"
                },
                "from_": {
                    "type": "string",
                    "description": "Sender phone number (must be a Twilio phone number you own)"
                },
                "body": {
                    "type": "string",
                    "description": "Optional message text to accompany the media"
                },
                "media_url": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of media URLs to attach (max 10 attachments)"
                },
                "status_callback": {
                    "type": "string",
                    "description": "Optional webhook URL to receive delivery status updates"
                }
            }, ["to", "from_"]),
        ),
        ToolDescriptor::new(
            GET_MESSAGES,
            "Retrieve a list of SMS/MMS messages from your Twilio account. Use this to check message history, delivery status, or find specific conversations.",
            tool_schema!({
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of messages to retrieve (default 20, max 1000)",
                    "default": 20
                },
                "date_sent_after": {
                    "type": "string",
                    "description": "ISO date string to filter messages sent after this date (e.g., '2024-01-01')"
                },
                "date_sent_before": {
                    "type": "string",
                    "description": "ISO date string to filter messages sent before this date"
                },
                "from_": {
                    "type": "string",
                    "description": "Filter by sender phone number"
                },
                "to": {
                    "type": "string",
                    "description": "Filter by recipient phone number"
                }
            }, []),
        ),
        ToolDescriptor::new(
            GET_MESSAGE_BY_SID,
            "Retrieve detailed information about a specific message using its unique SID. Use this when you need complete details about a particular message including delivery status and error information.",
            tool_schema!({
                "message_sid": {
                    "type": "string",
                    "description": "Unique identifier (SID) for the message"
                }
            }, ["message_sid"]),
        ),
    ]
}

pub async fn send_sms(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(&args, SEND_SMS, &["to", "from_", "body", "status_callback"])?;
    let to = validate_phone_number(&get_string_arg(&args, "to")?)?;
    let from = validate_phone_number(&get_string_arg(&args, "from_")?)?;
    let body = get_string_arg(&args, "body")?;

    if body.chars().count() > MAX_BODY_CHARS {
        return Err(Error::invalid_args("SMS body cannot exceed 1600 characters"));
    }

    info!("Sending SMS from {} to {}", from, to);

    let mut form = vec![("To", to), ("From", from), ("Body", body)];
    if let Some(callback) = get_filter_arg(&args, "status_callback")? {
        form.push(("StatusCallback", callback));
    }

    let message = client.post_form("/Messages.json", &form).await?;
    info!("SMS sent, sid {}", message["sid"]);
    Ok(Value::Object(pick(&message, SENT_FIELDS)))
}

pub async fn send_mms(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(
        &args,
        SEND_MMS,
        &["to", "from_", "body", "media_url", "status_callback"],
    )?;
    let to = validate_phone_number(&get_string_arg(&args, "to")?)?;
    let from = validate_phone_number(&get_string_arg(&args, "from_")?)?;
    let body = get_filter_arg(&args, "body")?;
    let media = get_string_array_arg(&args, "media_url")?;

    if body.is_none() && media.is_empty() {
        return Err(Error::invalid_args(
            "MMS must contain either body text or media URL",
        ));
    }
    if media.len() > MAX_MEDIA {
        return Err(Error::invalid_args(
            "Maximum 10 media attachments allowed per MMS",
        ));
    }

    info!("Sending MMS from {} to {}", from, to);

    let mut form = vec![("To", to), ("From", from)];
    if let Some(body) = body {
        form.push(("Body", body));
    }
    form.extend(media.into_iter().map(|url| ("MediaUrl", url)));
    if let Some(callback) = get_filter_arg(&args, "status_callback")? {
        form.push(("StatusCallback", callback));
    }

    let message = client.post_form("/Messages.json", &form).await?;
    info!("MMS sent, sid {}", message["sid"]);
    Ok(Value::Object(pick(&message, MMS_FIELDS)))
}

pub async fn get_messages(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(
        &args,
        GET_MESSAGES,
        &["limit", "date_sent_after", "date_sent_before", "from_", "to"],
    )?;
    let limit = clamp_limit(get_int_arg(&args, "limit", 20)?, MAX_LIST_LIMIT);

    let mut query = vec![("PageSize", limit.to_string())];
    let mut filters = Map::new();

    if let Some(after) = get_filter_arg(&args, "date_sent_after")? {
        query.push(("DateSent>", after.clone()));
        filters.insert("date_sent_after".into(), after.into());
    }
    if let Some(before) = get_filter_arg(&args, "date_sent_before")? {
        query.push(("DateSent<", before.clone()));
        filters.insert("date_sent_before".into(), before.into());
    }
    if let Some(from) = get_filter_arg(&args, "from_")? {
        let from = validate_phone_number(&from)?;
        query.push(("From", from.clone()));
        filters.insert("from_".into(), from.into());
    }
    if let Some(to) = get_filter_arg(&args, "to")? {
        let to = validate_phone_number(&to)?;
        query.push(("To", to.clone()));
        filters.insert("to".into(), to.into());
    }

    info!("Retrieving up to {} messages", limit);

    let page = client.get("/Messages.json", &query).await?;
    let messages: Vec<Value> = page_items(&page, "messages")
        .iter()
        .map(|m| Value::Object(pick(m, LIST_FIELDS)))
        .collect();

    Ok(json!({
        "count": messages.len(),
        "messages": messages,
        "filters_applied": filters,
    }))
}

pub async fn get_message_by_sid(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(&args, GET_MESSAGE_BY_SID, &["message_sid"])?;
    let sid = get_string_arg(&args, "message_sid")?;
    validate_sid("message SID", &sid)?;

    info!("Retrieving message {}", sid);

    let message = client
        .get(&format!("/Messages/{}.json", sid), &[])
        .await?;
    Ok(Value::Object(pick(&message, DETAIL_FIELDS)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Client that fails any request it actually sends.
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
    fn test_descriptors() {
        let names: Vec<_> = descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec![SEND_SMS, SEND_MMS, GET_MESSAGES, GET_MESSAGE_BY_SID]);
    }

    #[tokio::test]
    async fn test_send_sms_rejects_long_body() {
        let body = "x".repeat(MAX_BODY_CHARS + 1);
        let err = send_sms(
            &offline_client(),
            args(json!({"to": "+15550001111", "from_": "+15550002222", "body": body})),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("SMS body cannot exceed 1600 characters"));
    }

    #[tokio::test]
    async fn test_send_sms_rejects_unknown_argument() {
        let err = send_sms(
            &offline_client(),
            args(json!({"to": "+1", "from_": "+2", "body": "hi", "priority": "high"})),
        )
        .await
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("unexpected argument 'priority' for tool twilio_send_sms"));
    }

    #[tokio::test]
    async fn test_send_sms_missing_body() {
        let err = send_sms(
            &offline_client(),
            args(json!({"to": "+15550001111", "from_": "+15550002222"})),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Missing required argument: body"));
    }

    #[tokio::test]
    async fn test_send_mms_requires_content() {
        let err = send_mms(
            &offline_client(),
            args(json!({"to": "+15550001111", "from_": "+15550002222"})),
        )
        .await
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("MMS must contain either body text or media URL"));
    }

    #[tokio::test]
    async fn test_send_mms_media_limit() {
        let media: Vec<String> = (0..11).map(|i| format!("https://e.x/{}.png", i)).collect();
        let err = send_mms(
            &offline_client(),
            args(json!({"to": "+15550001111", "from_": "+15550002222", "media_url": media})),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Maximum 10 media attachments"));
    }

    #[tokio::test]
    async fn test_get_message_by_sid_rejects_path_characters() {
        let err = get_message_by_sid(&offline_client(), args(json!({"message_sid": "../x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid message SID"));
    }
}
