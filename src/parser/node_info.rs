//! Node label metadata extraction
//!
//! Providers smuggle account metadata into node names, e.g.
//! `套餐到期:2026-01-15`, `剩余流量:512GB` or `Node-7 exp:1767225600`.
//! This module pulls expiry dates and remaining traffic out of those labels.
//! Every function here is total: any input yields `Some`/`None`, never an
//! error or a panic.

use chrono::{DateTime, Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Label Patterns
// ============================================================================

/// Expiry marker followed by an ISO date, e.g. `到期:2026-01-15`,
/// `过期：2026-01-15`, `Expire 2026-01-15`
static EXPIRE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:到期|过期|expires?)\s*[:：]?\s*(\d{4}-\d{2}-\d{2})").unwrap());

/// Unix timestamp marker, e.g. `exp:1767225600` or `exp:1767225600000`.
/// The digit run is captured whole and validated by length afterwards.
static EXP_TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bexp\s*[:：]\s*(\d+)").unwrap());

/// Remaining traffic marker, e.g. `剩余:512GB`, `流量: 1.5T`, `remain:2tb`
static REMAIN_TRAFFIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:剩余|流量|remain)\s*[:：]?\s*(\d+(?:\.\d+)?)\s*([GT]B?)").unwrap()
});

/// Relative expiry marker, e.g. `剩余:30天` or `还剩 15 天`
static DAYS_REMAINING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:剩余|还剩)\s*[:：]?\s*(\d{1,5})\s*天").unwrap());

// ============================================================================
// Parsed Node Info
// ============================================================================

/// Metadata extracted from a single node label
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedNodeInfo {
    /// The label the metadata was extracted from
    pub name: String,

    /// Expiry date in `YYYY-MM-DD`, if the label carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_date: Option<String>,

    /// Remaining traffic in GB, if the label carried it
    #[serde(
        rename = "remainTrafficGB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub remain_traffic_gb: Option<f64>,
}

/// Extracts all supported metadata from one node label.
///
/// The expiry and traffic extractions are independent; a label may yield
/// neither, either, or both.
pub fn parse_node_info(name: &str) -> ParsedNodeInfo {
    ParsedNodeInfo {
        name: name.to_string(),
        expire_date: extract_expire_date(name),
        remain_traffic_gb: extract_remain_traffic_gb(name),
    }
}

// ============================================================================
// Extraction Functions
// ============================================================================

/// Extracts an absolute expiry date from a node label.
///
/// Priority order:
/// 1. Expiry marker plus ISO date, used verbatim
/// 2. `exp:` Unix timestamp; exactly 10 digits are seconds, 11 to 13 digits
///    are milliseconds; converted to the UTC calendar date
///
/// Anything else, including out-of-range timestamps, yields `None`.
pub fn extract_expire_date(name: &str) -> Option<String> {
    if let Some(caps) = EXPIRE_DATE_RE.captures(name) {
        return Some(caps[1].to_string());
    }

    let caps = EXP_TIMESTAMP_RE.captures(name)?;
    let digits = &caps[1];
    let value: i64 = digits.parse().ok()?;
    let timestamp = match digits.len() {
        10 => DateTime::from_timestamp(value, 0),
        11..=13 => DateTime::from_timestamp_millis(value),
        _ => None,
    }?;
    Some(timestamp.date_naive().format("%Y-%m-%d").to_string())
}

/// Extracts remaining traffic in GB from a node label.
///
/// Matches a remaining-traffic marker followed by a decimal number and a
/// `GB`/`G`/`TB`/`T` unit (case-insensitive). Terabyte values are converted
/// with a factor of 1024.
pub fn extract_remain_traffic_gb(name: &str) -> Option<f64> {
    let caps = REMAIN_TRAFFIC_RE.captures(name)?;
    let amount: f64 = caps[1].parse().ok()?;
    let unit = caps[2].to_ascii_uppercase();
    if unit.starts_with('T') {
        Some(amount * 1024.0)
    } else {
        Some(amount)
    }
}

/// Extracts a relative "N days remaining" marker from a node label.
///
/// This is a separate rule from [`extract_expire_date`]: per-user shares
/// label expiry as a countdown instead of an absolute date.
pub fn extract_days_remaining(name: &str) -> Option<u64> {
    let caps = DAYS_REMAINING_RE.captures(name)?;
    caps[1].parse().ok()
}

/// Converts a "N days remaining" marker into a concrete `YYYY-MM-DD` date
/// by adding N days to the given day.
pub fn days_remaining_to_date(name: &str, today: NaiveDate) -> Option<String> {
    let days = extract_days_remaining(name)?;
    let date = today.checked_add_days(Days::new(days))?;
    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_expire_date_localized_marker() {
        assert_eq!(
            extract_expire_date("套餐到期:2026-01-15"),
            Some("2026-01-15".to_string())
        );
        assert_eq!(
            extract_expire_date("过期：2026-02-01 节点A"),
            Some("2026-02-01".to_string())
        );
    }

    #[test]
    fn test_extract_expire_date_ascii_marker() {
        assert_eq!(
            extract_expire_date("Expire: 2026-03-01"),
            Some("2026-03-01".to_string())
        );
        assert_eq!(
            extract_expire_date("expires 2026-03-01"),
            Some("2026-03-01".to_string())
        );
    }

    #[test]
    fn test_extract_expire_date_timestamp_seconds() {
        // 1767225600 = 2026-01-01T00:00:00Z
        assert_eq!(
            extract_expire_date("Node-7 exp:1767225600"),
            Some("2026-01-01".to_string())
        );
    }

    #[test]
    fn test_extract_expire_date_timestamp_millis() {
        // 1767225600000 ms = 2026-01-01T00:00:00Z
        assert_eq!(
            extract_expire_date("exp:1767225600000"),
            Some("2026-01-01".to_string())
        );
    }

    #[test]
    fn test_extract_expire_date_marker_wins_over_timestamp() {
        assert_eq!(
            extract_expire_date("到期:2026-01-15 exp:1767225600"),
            Some("2026-01-15".to_string())
        );
    }

    #[test]
    fn test_extract_expire_date_rejects_bad_timestamps() {
        // 9 digits: too short to be a plausible timestamp
        assert_eq!(extract_expire_date("exp:176722560"), None);
        // 14 digits: too long
        assert_eq!(extract_expire_date("exp:17672256000000"), None);
        // Overflows i64
        assert_eq!(extract_expire_date("exp:99999999999999999999999"), None);
    }

    #[test]
    fn test_extract_expire_date_absent() {
        assert_eq!(extract_expire_date("Tokyo-01"), None);
        assert_eq!(extract_expire_date(""), None);
        assert_eq!(extract_expire_date("到期:soon"), None);
    }

    #[test]
    fn test_extract_remain_traffic_gb_basic() {
        assert_eq!(extract_remain_traffic_gb("剩余:512GB"), Some(512.0));
        assert_eq!(extract_remain_traffic_gb("流量: 1.5G"), Some(1.5));
        assert_eq!(extract_remain_traffic_gb("remain:500gb"), Some(500.0));
    }

    #[test]
    fn test_extract_remain_traffic_gb_terabytes() {
        assert_eq!(extract_remain_traffic_gb("剩余:2TB"), Some(2048.0));
        assert_eq!(extract_remain_traffic_gb("剩余 0.5 T"), Some(512.0));
    }

    #[test]
    fn test_extract_remain_traffic_gb_absent() {
        assert_eq!(extract_remain_traffic_gb("Tokyo-01"), None);
        assert_eq!(extract_remain_traffic_gb("剩余:30天"), None);
        assert_eq!(extract_remain_traffic_gb(""), None);
    }

    #[test]
    fn test_extract_days_remaining() {
        assert_eq!(extract_days_remaining("剩余:30天"), Some(30));
        assert_eq!(extract_days_remaining("还剩 15 天"), Some(15));
        assert_eq!(extract_days_remaining("剩余:512GB"), None);
        assert_eq!(extract_days_remaining("Tokyo-01"), None);
    }

    #[test]
    fn test_days_remaining_to_date() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(
            days_remaining_to_date("剩余:30天", today),
            Some("2026-01-31".to_string())
        );
        assert_eq!(days_remaining_to_date("Tokyo-01", today), None);
    }

    #[test]
    fn test_parse_node_info_both_fields() {
        let info = parse_node_info("HK-01 到期:2026-01-15 剩余:2TB");
        assert_eq!(info.expire_date, Some("2026-01-15".to_string()));
        assert_eq!(info.remain_traffic_gb, Some(2048.0));
        assert_eq!(info.name, "HK-01 到期:2026-01-15 剩余:2TB");
    }

    #[test]
    fn test_parse_node_info_traffic_skips_day_marker() {
        // The first marker is a day countdown; traffic must still be found
        let info = parse_node_info("剩余:30天 剩余:100GB");
        assert_eq!(info.remain_traffic_gb, Some(100.0));
    }

    #[test]
    fn test_parse_node_info_never_panics() {
        for name in [
            "",
            "   ",
            "到期:",
            "exp:",
            "exp:abc",
            "剩余:GB",
            "剩余:999999999999999999999999999999TB",
            "🇺🇸 US %% ## :: 到期",
            "exp:1767225600extra1767225600",
        ] {
            let _ = parse_node_info(name);
            let _ = extract_days_remaining(name);
        }
    }

    #[test]
    fn test_parsed_node_info_serialization() {
        let info = parse_node_info("到期:2026-01-15 剩余:1GB");
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains(r#""expireDate":"2026-01-15""#));
        assert!(json.contains(r#""remainTrafficGB":1.0"#));
    }
}
