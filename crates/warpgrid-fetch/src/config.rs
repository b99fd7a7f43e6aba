//! Transport configuration.
//!
//! Parsed from TOML, e.g.:
//!
//! ```toml
//! credentials = "same-origin"
//! timeout = "30s"
//!
//! [default_headers]
//! User-Agent = "warp-fetch/0.1"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::CredentialsMode;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Credentials policy applied to every request.
    pub credentials: CredentialsMode,
    /// Request deadline as a duration string (`"500ms"`, `"30s"`, `"2m"`, `"1h"`,
    /// or bare seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Headers added to requests that do not already carry that name.
    pub default_headers: BTreeMap<String, String>,
}

impl FetchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: FetchConfig = toml::from_str(content)?;
        if let Some(raw) = &config.timeout
            && parse_duration(raw).is_none()
        {
            anyhow::bail!("invalid timeout {raw:?}: expected e.g. \"500ms\", \"30s\", \"2m\"");
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The parsed timeout, if one is configured and valid.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.as_deref().and_then(parse_duration)
    }
}

/// Parse `"500ms"`, `"30s"`, `"2m"`, `"1h"`, or a bare number of seconds.
///
/// Values whose second count overflows `u64` are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit_secs) = if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else {
        (s, 1)
    };
    let n = digits.trim().parse::<u64>().ok()?;
    n.checked_mul(unit_secs).map(Duration::from_secs)
}
