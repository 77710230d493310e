//! Per-sync aggregation
//!
//! Pure fold over the classified line set. Deterministic and
//! order-independent: counts, the lexicographic minimum expiry date, the
//! rounded traffic sum and the histogram do not depend on line order.

use tracing::trace;

use crate::model::ProtocolCounts;
use crate::parser::{classify_line, extract_remain_traffic_gb};

/// Aggregated statistics for one subscription body
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStats {
    /// Lines accepted as proxy nodes
    pub node_count: usize,

    /// Non-empty lines rejected by the classifier
    pub invalid_lines: usize,

    /// Smallest extracted `YYYY-MM-DD` date (ISO order == chronological)
    pub earliest_expire: Option<String>,

    /// Sum of extracted traffic in GB, rounded to 2 decimal places.
    /// `None` when no line carried traffic info, never zero-for-unknown.
    pub total_remain_gb: Option<f64>,

    /// Per-protocol histogram
    pub protocols: ProtocolCounts,

    /// Accepted lines, verbatim (trimmed)
    pub raw_lines: Vec<String>,
}

/// Aggregates one decoded subscription body.
///
/// `extract_expiry` maps a node label to an expiry date; the global and
/// per-user syncs plug in different extraction rules here without changing
/// any other aggregation behavior.
pub fn aggregate<F>(content: &str, extract_expiry: F) -> NodeStats
where
    F: Fn(&str) -> Option<String>,
{
    let mut stats = NodeStats::default();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some(classified) = classify_line(trimmed) else {
            trace!("Rejected line: {:?}", trimmed);
            stats.invalid_lines += 1;
            continue;
        };

        stats.node_count += 1;
        stats.protocols.record(classified.protocol);
        stats.raw_lines.push(trimmed.to_string());

        if let Some(date) = extract_expiry(&classified.label) {
            stats.earliest_expire = match stats.earliest_expire.take() {
                Some(current) if current <= date => Some(current),
                _ => Some(date),
            };
        }
        if let Some(gb) = extract_remain_traffic_gb(&classified.label) {
            stats.total_remain_gb = Some(stats.total_remain_gb.unwrap_or(0.0) + gb);
        }
    }

    if let Some(total) = stats.total_remain_gb {
        stats.total_remain_gb = Some((total * 100.0).round() / 100.0);
    }

    stats
}
