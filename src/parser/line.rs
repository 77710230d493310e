//! Proxy share line classification
//!
//! A subscription body is a newline-delimited list of proxy share URIs,
//! optionally suffixed with `#<urlencoded-label>`. This module decides which
//! lines are proxy nodes, tags them with a protocol for statistics, and
//! extracts the human-readable label.

// ============================================================================
// Scheme Table
// ============================================================================

/// Recognized share URI schemes, matched case-insensitively.
///
/// Longer prefixes come first so `ssr://` is not shadowed by `ss://` and
/// `hysteria2://` is not shadowed by `hysteria://`.
const PROXY_SCHEMES: &[(&str, Protocol)] = &[
    ("vless://", Protocol::Vless),
    ("trojan://", Protocol::Trojan),
    ("vmess://", Protocol::Vmess),
    ("ssr://", Protocol::Ssr),
    ("ss://", Protocol::Shadowsocks),
    ("hysteria2://", Protocol::Other),
    ("hysteria://", Protocol::Other),
    ("tuic://", Protocol::Other),
    ("wireguard://", Protocol::Other),
];

/// Protocol bucket used for per-sync statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Vless,
    Trojan,
    Vmess,
    Shadowsocks,
    Ssr,
    /// Valid share scheme without a dedicated counter (hysteria, tuic, ...)
    Other,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Vless => write!(f, "vless"),
            Protocol::Trojan => write!(f, "trojan"),
            Protocol::Vmess => write!(f, "vmess"),
            Protocol::Shadowsocks => write!(f, "shadowsocks"),
            Protocol::Ssr => write!(f, "ssr"),
            Protocol::Other => write!(f, "other"),
        }
    }
}

// ============================================================================
// Line Classification
// ============================================================================

/// A share line accepted as a proxy node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    /// Protocol bucket for the statistics histogram
    pub protocol: Protocol,
    /// Percent-decoded label after the first `#`, empty when absent
    pub label: String,
}

/// Checks if a line starts with a recognized share scheme
pub fn is_proxy_line(line: &str) -> bool {
    let lower = line.trim().to_ascii_lowercase();
    PROXY_SCHEMES.iter().any(|(scheme, _)| lower.starts_with(scheme))
}

/// Classifies one line of subscription content.
///
/// Returns `None` for lines that do not start with a recognized scheme.
/// The label is everything after the first `#`, percent-decoded; a malformed
/// escape sequence falls back to the raw substring rather than dropping the
/// line.
pub fn classify_line(line: &str) -> Option<ClassifiedLine> {
    let trimmed = line.trim();
    let lower = trimmed.to_ascii_lowercase();

    let protocol = PROXY_SCHEMES
        .iter()
        .find(|(scheme, _)| lower.starts_with(scheme))
        .map(|(_, protocol)| *protocol)?;

    let label = match trimmed.find('#') {
        Some(pos) => {
            let raw = &trimmed[pos + 1..];
            urlencoding::decode(raw)
                .unwrap_or_else(|_| raw.into())
                .into_owned()
        }
        None => String::new(),
    };

    Some(ClassifiedLine { protocol, label })
}
