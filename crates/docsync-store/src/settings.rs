//! Per-index settings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// How often an index makes newly written documents searchable.
///
/// `-1` disables periodic refresh: writes stay invisible until an
/// explicit refresh. Other values use the `<n>ms|s|m` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefreshInterval(String);

impl RefreshInterval {
    const DISABLED: &'static str = "-1";

    pub fn disabled() -> Self {
        Self(Self::DISABLED.to_string())
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        let value = value.trim();
        if value == Self::DISABLED {
            return Ok(Self::disabled());
        }
        let digits = value
            .strip_suffix("ms")
            .or_else(|| value.strip_suffix('s'))
            .or_else(|| value.strip_suffix('m'))
            .ok_or_else(|| StoreError::InvalidRefreshInterval(value.to_string()))?;
        match digits.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Self(value.to_string())),
            _ => Err(StoreError::InvalidRefreshInterval(value.to_string())),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.0 == Self::DISABLED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self("1s".to_string())
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RefreshInterval {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RefreshInterval> for String {
    fn from(value: RefreshInterval) -> Self {
        value.0
    }
}

/// Settings of one physical index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub refresh_interval: RefreshInterval,
}

impl IndexSettings {
    pub fn with_refresh_interval(refresh_interval: RefreshInterval) -> Self {
        Self { refresh_interval }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_intervals() {
        assert!(RefreshInterval::parse("1s").is_ok());
        assert!(RefreshInterval::parse("250ms").is_ok());
        assert!(RefreshInterval::parse("2m").is_ok());
        assert!(RefreshInterval::parse("-1").unwrap().is_disabled());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RefreshInterval::parse("").is_err());
        assert!(RefreshInterval::parse("soon").is_err());
        assert!(RefreshInterval::parse("0s").is_err());
        assert!(RefreshInterval::parse("10").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let interval: RefreshInterval = serde_json::from_str("\"5s\"").unwrap();
        assert_eq!(interval.as_str(), "5s");
        assert!(serde_json::from_str::<RefreshInterval>("\"x\"").is_err());
    }
}
