// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the import engine.

use crate::{errors::ConfigParseError, timestamp::TimestampStrategy};
use camino::Utf8Path;
use chrono::FixedOffset;
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Overall configuration for importing a log.
///
/// Built from the default config shipped with this crate, with an optional user file layered on
/// top.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImportConfig {
    /// How timestamps are reconstructed.
    pub timestamps: TimestampConfig,

    /// Which log messages carry outcome, tag and plan payloads.
    pub messages: MessageSources,
}

impl ImportConfig {
    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file layered over the defaults, or returns the defaults if
    /// no file is given.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        let Some(config_file) = config_file else {
            return Ok(Self::default_config());
        };

        let builder = Self::make_default_config()
            .add_source(File::new(config_file.as_str(), FileFormat::Toml));
        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| ConfigParseError::new(config_file, err))
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        Self::make_default_config()
            .build()
            .expect("default config is always valid")
            .try_deserialize()
            .expect("default config is always valid")
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Timestamp reconstruction settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimestampConfig {
    /// The end timestamp strategy.
    pub strategy: TimestampStrategy,

    /// Offset of the log's wall clock from UTC.
    #[serde(deserialize_with = "deserialize_offset")]
    pub utc_offset: FixedOffset,
}

/// Identifies a log message by its `entity` and `user` attributes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageSource {
    /// The `entity` attribute.
    pub entity: String,
    /// The `user` attribute.
    pub user: String,
}

impl MessageSource {
    /// Returns true if a message with these attributes comes from this source.
    pub fn matches(&self, entity: Option<&str>, user: Option<&str>) -> bool {
        entity == Some(self.entity.as_str()) && user == Some(self.user.as_str())
    }
}

/// The message sources recognized by the importer.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageSources {
    /// Per-test obtained/expected result messages.
    pub outcome: MessageSource,
    /// Run-wide TRC tag messages.
    pub tags: MessageSource,
    /// Execution plan messages.
    pub plan: MessageSource,
}

fn deserialize_offset<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
where
    D: Deserializer<'de>,
{
    struct V;

    impl serde::de::Visitor<'_> for V {
        type Value = FixedOffset;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a UTC offset such as \"+03:00\"")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            v.parse()
                .map_err(|_| E::invalid_value(serde::de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_str(V)
}
