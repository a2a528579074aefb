//! Twilio tool implementations.
//!
//! This module contains all 16 tools organized by category:
//!
//! - `messaging` - SMS/MMS sending and message history (4 tools)
//! - `voice` - Outbound calls, call history and recordings (4 tools)
//! - `phone_numbers` - Number search, purchase and configuration (5 tools)
//! - `account` - Account details, balance and usage (3 tools)

pub mod account;
pub mod messaging;
pub mod phone_numbers;
pub mod voice;

use std::sync::Arc;

use crate::error::Result;
use crate::gateway::{Arguments, DispatchRouter, HandlerRegistry, ToolCatalog};
use crate::metrics::GatewayMetrics;
use crate::twilio::TwilioClient;

/// Register async fns of the form `fn(&TwilioClient, Arguments)` over a shared client.
macro_rules! register_tools {
    ($registry:expr, $client:expr, { $($name:path => $handler:path),* $(,)? }) => {
        $(
            let client = Arc::clone(&$client);
            $registry.register_fn($name, move |args: Arguments| {
                let client = Arc::clone(&client);
                async move { $handler(&client, args).await }
            })?;
        )*
    };
}

/// The tool catalog, in advertised order.
pub fn catalog() -> Result<ToolCatalog> {
    ToolCatalog::new(
        [
            messaging::descriptors(),
            voice::descriptors(),
            phone_numbers::descriptors(),
            account::descriptors(),
        ]
        .concat(),
    )
}

/// Handlers for every catalogued tool.
pub fn registry(client: Arc<TwilioClient>) -> Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    register_tools!(registry, client, {
        // Messaging (4)
        messaging::SEND_SMS => messaging::send_sms,
        messaging::SEND_MMS => messaging::send_mms,
        messaging::GET_MESSAGES => messaging::get_messages,
        messaging::GET_MESSAGE_BY_SID => messaging::get_message_by_sid,
        // Voice (4)
        voice::MAKE_CALL => voice::make_call,
        voice::GET_CALLS => voice::get_calls,
        voice::GET_CALL_BY_SID => voice::get_call_by_sid,
        voice::GET_RECORDINGS => voice::get_recordings,
        // Phone numbers (5)
        phone_numbers::SEARCH_AVAILABLE_NUMBERS => phone_numbers::search_available_numbers,
        phone_numbers::PURCHASE_PHONE_NUMBER => phone_numbers::purchase_phone_number,
        phone_numbers::LIST_PHONE_NUMBERS => phone_numbers::list_phone_numbers,
        phone_numbers::UPDATE_PHONE_NUMBER => phone_numbers::update_phone_number,
        phone_numbers::RELEASE_PHONE_NUMBER => phone_numbers::release_phone_number,
        // Account (3)
        account::GET_ACCOUNT_INFO => account::get_account_info,
        account::GET_BALANCE => account::get_balance,
        account::GET_USAGE_RECORDS => account::get_usage_records,
    });

    Ok(registry)
}

/// Build the dispatch router for the Twilio tool set.
pub fn build_router(client: Arc<TwilioClient>, metrics: Arc<GatewayMetrics>) -> Result<DispatchRouter> {
    Ok(DispatchRouter::new(catalog()?, registry(client)?)?.with_metrics(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn client() -> Arc<TwilioClient> {
        Arc::new(
            TwilioClient::with_credentials(
                "http://127.0.0.1:9".to_string(),
                Some("AC_test".to_string()),
                None,
                Duration::from_millis(200),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_catalog_and_registry_in_lockstep() {
        let catalog = catalog().unwrap();
        let registry = registry(client()).unwrap();

        assert_eq!(catalog.len(), 16);
        assert_eq!(registry.len(), 16);

        let listed: HashSet<_> = catalog.names().collect();
        let registered: HashSet<_> = registry.names().collect();
        assert_eq!(listed, registered);
        assert!(build_router(client(), GatewayMetrics::new()).is_ok());
    }

    #[test]
    fn test_catalog_order() {
        let catalog = catalog().unwrap();
        let names: Vec<_> = catalog.names().collect();
        assert_eq!(names.first(), Some(&messaging::SEND_SMS));
        assert_eq!(names.last(), Some(&account::GET_USAGE_RECORDS));
        assert!(names.iter().all(|n| n.starts_with("twilio_")));
    }

    #[test]
    fn test_schemas_are_objects() {
        for tool in catalog().unwrap().list_tools() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            let required = tool.input_schema["required"].as_array().unwrap();
            for name in required {
                let name = name.as_str().unwrap();
                assert!(
                    tool.input_schema["properties"].get(name).is_some(),
                    "{} requires undeclared {}",
                    tool.name,
                    name
                );
            }
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_a_failure_envelope() {
        let router = build_router(client(), GatewayMetrics::new()).unwrap();
        let envelope = router
            .dispatch(account::GET_BALANCE, Arguments::new())
            .await;
        let err = envelope.into_result().unwrap_err();
        assert!(err.contains("Authentication token not found"));
    }
}
