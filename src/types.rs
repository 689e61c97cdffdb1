use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// What the script loader does with placeholders left in a payload after
/// substitution.
///
/// - `Lenient`: leave them in place silently (default, mirrors how the
///   payloads have always been treated).
/// - `Warn`: leave them in place but log every leftover name.
/// - `Deny`: reject the payload. Useful in test suites that must prove full
///   substitution coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderPolicy {
    Lenient,
    Warn,
    Deny,
}

impl Default for PlaceholderPolicy {
    fn default() -> Self {
        PlaceholderPolicy::Lenient
    }
}

impl FromStr for PlaceholderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(PlaceholderPolicy::Lenient),
            "warn" => Ok(PlaceholderPolicy::Warn),
            "deny" => Ok(PlaceholderPolicy::Deny),
            other => Err(format!(
                "invalid placeholder_policy: {other} (expected \"lenient\", \"warn\" or \"deny\")"
            )),
        }
    }
}

/// Where step fingerprints are persisted between applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintStorage {
    /// Store fingerprints in `<state_dir>/fingerprints`.
    File,
    /// Keep fingerprints in memory only (every apply re-runs every step).
    Memory,
}

impl Default for FingerprintStorage {
    fn default() -> Self {
        FingerprintStorage::File
    }
}

/// Parse a short duration string such as `"500ms"`, `"30s"`, `"10m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
