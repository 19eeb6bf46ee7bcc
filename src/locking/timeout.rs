// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{LockError, Result};
use std::fmt;
use std::time::Duration;

/// How long a blocking `lock` may wait before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockTimeoutValue {
    Finite(Duration),
    #[default]
    Infinite,
}

impl LockTimeoutValue {
    pub const fn from_secs(seconds: u64) -> Self {
        Self::Finite(Duration::from_secs(seconds))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self::Finite(Duration::from_millis(millis))
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, LockTimeoutValue::Infinite)
    }
}

impl fmt::Display for LockTimeoutValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockTimeoutValue::Infinite => f.write_str("infinite"),
            LockTimeoutValue::Finite(duration) if duration.subsec_millis() == 0 => {
                write!(f, "{}s", duration.as_secs())
            }
            LockTimeoutValue::Finite(duration) => write!(f, "{}ms", duration.as_millis()),
        }
    }
}

/// Where the effective timeout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockTimeoutSource {
    #[default]
    Default,
    Config,
    Environment,
    Explicit,
}

impl fmt::Display for LockTimeoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LockTimeoutSource::Default => "built-in default",
            LockTimeoutSource::Config => "configuration file",
            LockTimeoutSource::Environment => "environment variable",
            LockTimeoutSource::Explicit => "explicit override",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeoutResolution {
    pub value: LockTimeoutValue,
    pub source: LockTimeoutSource,
}

/// Parses `infinite` or a whole number of seconds.
pub fn parse_timeout_override(value: &str) -> Result<LockTimeoutValue> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("infinite") {
        return Ok(LockTimeoutValue::Infinite);
    }

    trimmed
        .parse::<u64>()
        .map(LockTimeoutValue::from_secs)
        .map_err(|_| {
            LockError::InvalidTimeout(format!(
                "'{trimmed}' is not a whole number of seconds or the word 'infinite'"
            ))
        })
}

/// Picks the effective timeout: explicit override, then environment, then
/// configuration, then the built-in default.
pub struct LockTimeoutResolver<'a> {
    explicit: Option<&'a str>,
    environment: Option<&'a str>,
    config_value: LockTimeoutValue,
    default_value: LockTimeoutValue,
}

impl<'a> LockTimeoutResolver<'a> {
    pub fn new(config_value: LockTimeoutValue, default_value: LockTimeoutValue) -> Self {
        Self {
            explicit: None,
            environment: None,
            config_value,
            default_value,
        }
    }

    pub fn with_explicit(mut self, value: Option<&'a str>) -> Self {
        self.explicit = value;
        self
    }

    pub fn with_environment(mut self, value: Option<&'a str>) -> Self {
        self.environment = value;
        self
    }

    pub fn resolve(self) -> Result<LockTimeoutResolution> {
        let overrides = [
            (self.explicit, LockTimeoutSource::Explicit),
            (self.environment, LockTimeoutSource::Environment),
        ];
        for (raw, source) in overrides {
            if let Some(raw) = raw {
                return Ok(LockTimeoutResolution {
                    value: parse_timeout_override(raw)?,
                    source,
                });
            }
        }

        let source = if self.config_value != self.default_value {
            LockTimeoutSource::Config
        } else {
            LockTimeoutSource::Default
        };
        Ok(LockTimeoutResolution {
            value: self.config_value,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_seconds_and_infinite() {
        assert_eq!(
            parse_timeout_override(" 15 ").unwrap(),
            LockTimeoutValue::from_secs(15)
        );
        assert_eq!(
            parse_timeout_override("INFINITE").unwrap(),
            LockTimeoutValue::Infinite
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = parse_timeout_override("soon").unwrap_err();
        assert!(matches!(err, LockError::InvalidTimeout(_)));
        assert!(err.to_string().contains("'soon'"));
    }

    #[test]
    fn explicit_beats_environment() {
        let resolution = LockTimeoutResolver::new(
            LockTimeoutValue::from_secs(60),
            LockTimeoutValue::Infinite,
        )
        .with_explicit(Some("5"))
        .with_environment(Some("10"))
        .resolve()
        .unwrap();

        assert_eq!(resolution.source, LockTimeoutSource::Explicit);
        assert_eq!(resolution.value, LockTimeoutValue::from_secs(5));
    }

    #[test]
    fn environment_beats_config() {
        let resolution = LockTimeoutResolver::new(
            LockTimeoutValue::from_secs(60),
            LockTimeoutValue::Infinite,
        )
        .with_environment(Some("infinite"))
        .resolve()
        .unwrap();

        assert_eq!(resolution.source, LockTimeoutSource::Environment);
        assert!(resolution.value.is_infinite());
    }

    #[test]
    fn config_reported_only_when_it_differs() {
        let custom = LockTimeoutResolver::new(
            LockTimeoutValue::from_secs(60),
            LockTimeoutValue::Infinite,
        )
        .resolve()
        .unwrap();
        assert_eq!(custom.source, LockTimeoutSource::Config);

        let default =
            LockTimeoutResolver::new(LockTimeoutValue::Infinite, LockTimeoutValue::Infinite)
                .resolve()
                .unwrap();
        assert_eq!(default.source, LockTimeoutSource::Default);
    }

    #[test]
    fn display_uses_compact_units() {
        assert_eq!(LockTimeoutValue::from_secs(30).to_string(), "30s");
        assert_eq!(LockTimeoutValue::from_millis(250).to_string(), "250ms");
        assert_eq!(LockTimeoutValue::Infinite.to_string(), "infinite");
    }
}
