//! Monitor configuration loaded from TOML.
//!
//! The raw file shape is deserialized into `*Toml` structs and then
//! validated into [`MonitorConfig`]; invalid input is rejected with
//! [`TagError::InvalidConfig`] before any store is built.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::TagError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::sim::{SimProfile, ValueRange, GENERIC_RANGE};

/// Default spacing between automatic update steps.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(2000);

/// Validated monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Samples retained per tag history trail.
    pub history_capacity: usize,
    /// Spacing between automatic update steps.
    pub tick_interval: Duration,
    /// Endpoint to connect to at startup, if any.
    pub endpoint: Option<SmolStr>,
    /// Tags to register at startup.
    pub tags: Vec<TagConfig>,
}

/// One configured tag.
#[derive(Debug, Clone)]
pub struct TagConfig {
    /// Tag name, unique within the file.
    pub name: SmolStr,
    /// Server-side node address the tag mirrors.
    pub external_id: SmolStr,
    /// Engineering unit.
    pub unit: SmolStr,
    /// Draw range for automatic updates; the generic range when absent.
    pub range: Option<ValueRange>,
}

impl MonitorConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TagError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            TagError::InvalidConfig(SmolStr::new(format!("{}: {err}", path.display())))
        })?;
        debug!(path = %path.display(), "loaded monitor config");
        Self::parse(&text)
    }

    /// Parse and validate configuration text.
    pub fn parse(text: &str) -> Result<Self, TagError> {
        let raw: MonitorToml = toml::from_str(text)
            .map_err(|err| TagError::InvalidConfig(SmolStr::new(err.to_string())))?;
        raw.into_config()
    }

    /// Draw profile covering the configured tags.
    #[must_use]
    pub fn sim_profile(&self) -> SimProfile {
        let mut profile = SimProfile::empty(GENERIC_RANGE);
        for tag in &self.tags {
            if let Some(range) = tag.range {
                profile.set(tag.name.clone(), range);
            }
        }
        profile
    }
}

impl Default for MonitorConfig {
    /// The stock electrical monitor: three tags, two-second ticks.
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            tick_interval: DEFAULT_TICK_INTERVAL,
            endpoint: None,
            tags: vec![
                TagConfig {
                    name: SmolStr::new("Voltage"),
                    external_id: SmolStr::new("ns=2;i=2"),
                    unit: SmolStr::new("V"),
                    range: Some(ValueRange::new(190.0, 240.0)),
                },
                TagConfig {
                    name: SmolStr::new("Current"),
                    external_id: SmolStr::new("ns=2;i=3"),
                    unit: SmolStr::new("A"),
                    range: Some(ValueRange::new(1.0, 10.0)),
                },
                TagConfig {
                    name: SmolStr::new("Power"),
                    external_id: SmolStr::new("ns=2;i=4"),
                    unit: SmolStr::new("W"),
                    range: Some(ValueRange::new(500.0, 2400.0)),
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MonitorToml {
    monitor: Option<MonitorSection>,
    #[serde(default)]
    tags: Vec<TagSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MonitorSection {
    history_capacity: Option<usize>,
    tick_interval_ms: Option<u64>,
    endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TagSection {
    name: String,
    external_id: String,
    #[serde(default)]
    unit: String,
    low: Option<f64>,
    high: Option<f64>,
}

impl MonitorToml {
    fn into_config(self) -> Result<MonitorConfig, TagError> {
        let monitor = self.monitor.unwrap_or(MonitorSection {
            history_capacity: None,
            tick_interval_ms: None,
            endpoint: None,
        });
        let history_capacity = monitor.history_capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY);
        if history_capacity == 0 {
            return Err(TagError::InvalidConfig(SmolStr::new(
                "history_capacity must be at least 1",
            )));
        }
        let tick_interval = monitor
            .tick_interval_ms
            .map_or(DEFAULT_TICK_INTERVAL, Duration::from_millis);
        if tick_interval.is_zero() {
            return Err(TagError::InvalidConfig(SmolStr::new(
                "tick_interval_ms must be positive",
            )));
        }

        let mut tags = Vec::with_capacity(self.tags.len());
        for section in self.tags {
            if section.name.is_empty() {
                return Err(TagError::InvalidConfig(SmolStr::new(
                    "tag name cannot be empty",
                )));
            }
            if tags
                .iter()
                .any(|tag: &TagConfig| tag.name == section.name.as_str())
            {
                return Err(TagError::InvalidConfig(SmolStr::new(format!(
                    "duplicate tag name '{}'",
                    section.name
                ))));
            }
            let range = match (section.low, section.high) {
                (None, None) => None,
                (Some(low), Some(high)) => {
                    if !low.is_finite() || !high.is_finite() || low > high {
                        return Err(TagError::InvalidConfig(SmolStr::new(format!(
                            "tag '{}' has invalid range {low}..{high}",
                            section.name
                        ))));
                    }
                    Some(ValueRange::new(low, high))
                }
                _ => {
                    return Err(TagError::InvalidConfig(SmolStr::new(format!(
                        "tag '{}' must set both low and high or neither",
                        section.name
                    ))));
                }
            };
            tags.push(TagConfig {
                name: SmolStr::new(section.name),
                external_id: SmolStr::new(section.external_id),
                unit: SmolStr::new(section.unit),
                range,
            });
        }

        Ok(MonitorConfig {
            history_capacity,
            tick_interval,
            endpoint: monitor.endpoint.map(SmolStr::new),
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = MonitorConfig::parse(
            r#"
            [monitor]
            history_capacity = 20
            tick_interval_ms = 500
            endpoint = "opc.tcp://localhost:4840"

            [[tags]]
            name = "Voltage"
            external_id = "ns=2;i=2"
            unit = "V"
            low = 190.0
            high = 240.0

            [[tags]]
            name = "Flow"
            external_id = "ns=2;i=9"
            "#,
        )
        .expect("parse");
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.endpoint.as_deref(), Some("opc.tcp://localhost:4840"));
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.tags[0].range, Some(ValueRange::new(190.0, 240.0)));
        assert_eq!(config.tags[1].range, None);
        let profile = config.sim_profile();
        assert_eq!(profile.range_for("Voltage"), ValueRange::new(190.0, 240.0));
        assert_eq!(profile.range_for("Flow"), GENERIC_RANGE);
    }

    #[test]
    fn empty_text_yields_defaults_without_tags() {
        let config = MonitorConfig::parse("").expect("parse");
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.tick_interval, DEFAULT_TICK_INTERVAL);
        assert!(config.tags.is_empty());
    }

    #[test]
    fn rejects_duplicate_tag_names() {
        let err = MonitorConfig::parse(
            r#"
            [[tags]]
            name = "Voltage"
            external_id = "ns=2;i=2"

            [[tags]]
            name = "Voltage"
            external_id = "ns=2;i=3"
            "#,
        )
        .expect_err("duplicate must fail");
        assert!(matches!(err, TagError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_inverted_range() {
        let err = MonitorConfig::parse(
            r#"
            [[tags]]
            name = "Voltage"
            external_id = "ns=2;i=2"
            low = 240.0
            high = 190.0
            "#,
        )
        .expect_err("inverted range must fail");
        assert!(matches!(err, TagError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_half_open_range_and_zero_capacity() {
        assert!(MonitorConfig::parse(
            r#"
            [[tags]]
            name = "Voltage"
            external_id = "ns=2;i=2"
            low = 190.0
            "#,
        )
        .is_err());
        assert!(MonitorConfig::parse("[monitor]\nhistory_capacity = 0").is_err());
    }
}
