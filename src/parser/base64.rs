//! Base64 transport payload handling
//!
//! Upstream share endpoints sometimes wrap the whole newline-delimited URI
//! list into a single Base64 blob. This module detects that wrapping and
//! decodes it, supporting standard and URL-safe variants with or without
//! padding. A payload that fails to decode is passed through unchanged.

use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use tracing::{debug, trace};

/// Minimum cleaned length before a body is considered a wrapped payload.
///
/// Short bodies are too ambiguous: a single bare token or an empty share
/// would otherwise pass the character-class test.
const MIN_PAYLOAD_LEN: usize = 100;

// ============================================================================
// Transport Payload Detection
// ============================================================================

/// Checks whether a response body looks like a Base64-wrapped URI list.
///
/// All three conditions must hold:
/// 1. every non-whitespace character is in the Base64 alphabet
///    (standard or URL-safe, padding included)
/// 2. the body contains no literal `://`
/// 3. the cleaned body is longer than 100 characters
pub fn looks_like_transport_payload(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.contains("://") {
        return false;
    }

    let cleaned: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() <= MIN_PAYLOAD_LEN {
        return false;
    }

    cleaned.chars().all(|c| {
        c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=' || c == '-' || c == '_'
    })
}

/// Unwraps a Base64 transport payload, returning plain text content.
///
/// Bodies that do not look wrapped are returned as-is. A body that looks
/// wrapped but fails to decode (or decodes to invalid UTF-8) is also
/// returned as-is; the failure is only visible at debug level.
pub fn unwrap_transport_payload(content: &str) -> String {
    if !looks_like_transport_payload(content) {
        return content.to_string();
    }

    match decode_base64(content.trim()) {
        Ok(decoded) => match String::from_utf8(decoded) {
            Ok(text) => {
                debug!(
                    "Unwrapped Base64 transport payload: {} -> {} bytes",
                    content.len(),
                    text.len()
                );
                text
            }
            Err(e) => {
                debug!("Decoded payload is not valid UTF-8 ({}), keeping raw body", e);
                content.to_string()
            }
        },
        Err(e) => {
            debug!("Transport payload decode failed ({:#}), keeping raw body", e);
            content.to_string()
        }
    }
}

// ============================================================================
// Base64 Decoding
// ============================================================================

/// Decodes Base64 content, trying multiple variants
///
/// Attempts to decode the content using:
/// 1. Standard Base64
/// 2. URL-safe Base64
/// 3. URL-safe Base64 without padding
/// 4. Standard/URL-safe with padding added
///
/// Whitespace in the input is automatically removed before decoding.
pub fn decode_base64(content: &str) -> Result<Vec<u8>> {
    // Remove all whitespace (handles line breaks within Base64)
    let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    trace!(
        "Attempting Base64 decode, cleaned length: {} bytes",
        cleaned.len()
    );

    // Try standard Base64 first
    if let Ok(decoded) = STANDARD.decode(&cleaned) {
        trace!("Decoded using standard Base64");
        return Ok(decoded);
    }

    // Try URL-safe Base64
    if let Ok(decoded) = URL_SAFE.decode(&cleaned) {
        trace!("Decoded using URL-safe Base64");
        return Ok(decoded);
    }

    // Try URL-safe Base64 without padding
    if let Ok(decoded) = URL_SAFE_NO_PAD.decode(&cleaned) {
        trace!("Decoded using URL-safe Base64 without padding");
        return Ok(decoded);
    }

    // Try with padding added if needed
    let padded = add_base64_padding(&cleaned);
    if let Ok(decoded) = STANDARD.decode(&padded) {
        trace!("Decoded using standard Base64 with added padding");
        return Ok(decoded);
    }
    if let Ok(decoded) = URL_SAFE.decode(&padded) {
        trace!("Decoded using URL-safe Base64 with added padding");
        return Ok(decoded);
    }

    bail!("Failed to decode Base64 content")
}

/// Adds proper padding to Base64 string if missing
///
/// Base64 strings should have a length that is a multiple of 4.
/// This function adds '=' padding characters as needed.
pub fn add_base64_padding(s: &str) -> String {
    let mut result = s.to_string();
    while !result.len().is_multiple_of(4) {
        result.push('=');
    }
    result
}
