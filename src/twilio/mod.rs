//! Twilio REST API access used by the tool handlers.
//!
//! - `client` - authenticated HTTP client
//! - `format` - argument validation and response shaping

pub mod client;
pub mod format;

pub use client::TwilioClient;
pub use format::validate_phone_number;
