//! Account, balance and usage tools.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::gateway::registry::{
    get_filter_arg, get_int_arg, get_optional_string_arg, reject_unknown_args, Arguments,
};
use crate::gateway::ToolDescriptor;
use crate::tool_schema;
use crate::twilio::format::{clamp_limit, number_field, page_items, pick};
use crate::twilio::TwilioClient;

pub const GET_ACCOUNT_INFO: &str = "twilio_get_account_info";
pub const GET_BALANCE: &str = "twilio_get_balance";
pub const GET_USAGE_RECORDS: &str = "twilio_get_usage_records";

const MAX_USAGE_LIMIT: i64 = 1000;

// The account's own auth token is deliberately not echoed back.
const ACCOUNT_FIELDS: &[&str] = &[
    "sid",
    "friendly_name",
    "status",
    "type",
    "owner_account_sid",
    "date_created",
    "date_updated",
];

const USAGE_FIELDS: &[&str] = &[
    "category",
    "description",
    "count",
    "count_unit",
    "usage",
    "usage_unit",
    "price_unit",
    "start_date",
    "end_date",
];

/// Reporting period of a usage query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Monthly,
    Yearly,
    AllTime,
}

impl Granularity {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "all-time" => Ok(Self::AllTime),
            _ => Err(Error::invalid_args(
                "Granularity must be one of: daily, monthly, yearly, all-time",
            )),
        }
    }

    /// Usage records resource for this period.
    fn path(self) -> &'static str {
        match self {
            Self::Daily => "/Usage/Records/Daily.json",
            Self::Monthly => "/Usage/Records/Monthly.json",
            Self::Yearly => "/Usage/Records/Yearly.json",
            Self::AllTime => "/Usage/Records.json",
        }
    }
}

pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            GET_ACCOUNT_INFO,
            "Retrieve your Twilio account information including status, type, and creation date. Use this to verify account details and current status.",
            tool_schema!({}, []),
        ),
        ToolDescriptor::new(
            GET_BALANCE,
            "Get the current balance of your Twilio account. Use this to check available credit and monitor spending.",
            tool_schema!({}, []),
        ),
        ToolDescriptor::new(
            GET_USAGE_RECORDS,
            "Retrieve usage records for your Twilio account to analyze spending patterns, track usage by category, and generate usage reports. Perfect for billing analysis and cost monitoring.",
            tool_schema!({
                "category": {
                    "type": "string",
                    "description": "Usage category to filter by (e.g., 'sms', 'calls', 'recordings')"
                },
                "start_date": {
                    "type": "string",
                    "description": "Start date for usage period in YYYY-MM-DD format"
                },
                "end_date": {
                    "type": "string",
                    "description": "End date for usage period in YYYY-MM-DD format"
                },
                "granularity": {
                    "type": "string",
                    "description": "Time granularity for the report",
                    "enum": ["daily", "monthly", "yearly", "all-time"],
                    "default": "daily"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of records to retrieve (default 50, max 1000)"
                }
            }, []),
        ),
    ]
}

pub async fn get_account_info(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(&args, GET_ACCOUNT_INFO, &[])?;
    info!("Retrieving Twilio account information");

    let account = client.get(".json", &[]).await?;
    Ok(Value::Object(pick(&account, ACCOUNT_FIELDS)))
}

pub async fn get_balance(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(&args, GET_BALANCE, &[])?;
    info!("Retrieving account balance");

    let balance = client.get("/Balance.json", &[]).await?;
    Ok(Value::Object(pick(
        &balance,
        &["account_sid", "balance", "currency"],
    )))
}

pub async fn get_usage_records(client: &TwilioClient, args: Arguments) -> Result<Value> {
    reject_unknown_args(
        &args,
        GET_USAGE_RECORDS,
        &["category", "start_date", "end_date", "granularity", "limit"],
    )?;
    let granularity_name =
        get_optional_string_arg(&args, "granularity")?.unwrap_or_else(|| "daily".to_string());
    let granularity = Granularity::parse(&granularity_name)?;
    let limit = clamp_limit(get_int_arg(&args, "limit", 50)?, MAX_USAGE_LIMIT);

    let mut query = vec![("PageSize", limit.to_string())];
    let mut filters = Map::new();
    for (arg, key) in [
        ("category", "Category"),
        ("start_date", "StartDate"),
        ("end_date", "EndDate"),
    ] {
        if let Some(value) = get_filter_arg(&args, arg)? {
            query.push((key, value.clone()));
            filters.insert(arg.into(), value.into());
        }
    }

    info!("Retrieving usage records with granularity {}", granularity_name);

    let page = client.get(granularity.path(), &query).await?;
    let mut total_usage = 0.0;
    let mut total_price = 0.0;
    let records: Vec<Value> = page_items(&page, "usage_records")
        .iter()
        .map(|record| {
            let price = number_field(record, "price").unwrap_or(0.0);
            total_usage += number_field(record, "usage").unwrap_or(0.0);
            total_price += price;

            let mut out = pick(record, USAGE_FIELDS);
            out.insert("price".into(), json!(price));
            Value::Object(out)
        })
        .collect();

    let currency = records
        .first()
        .and_then(|r| r.get("price_unit"))
        .and_then(Value::as_str)
        .unwrap_or("USD")
        .to_string();

    Ok(json!({
        "count": records.len(),
        "usage_records": records,
        "summary": {
            "total_usage": total_usage,
            "total_price": (total_price * 10_000.0).round() / 10_000.0,
            "currency": currency,
            "granularity": granularity_name,
        },
        "filters_applied": filters,
    }))
}
