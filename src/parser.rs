//! Subscription Content Parsing Module
//!
//! This module provides functionality for:
//! - Unwrapping Base64 transport payloads (with various line break scenarios)
//! - Classifying proxy share lines (vless://, trojan://, vmess://, ss://, ...)
//! - Extracting expiry and remaining-traffic metadata from node labels

// Sub-modules
pub mod base64;
pub mod line;
pub mod node_info;

// Re-exports
pub use base64::{
    add_base64_padding, decode_base64, looks_like_transport_payload, unwrap_transport_payload,
};
pub use line::{ClassifiedLine, Protocol, classify_line, is_proxy_line};
pub use node_info::{
    ParsedNodeInfo, days_remaining_to_date, extract_days_remaining, extract_expire_date,
    extract_remain_traffic_gb, parse_node_info,
};
