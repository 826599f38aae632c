// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run-level payloads carried in dedicated log messages: TRC tags and the execution plan.

use crate::errors::PayloadError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Parses the body of a tag message into `(name, value)` pairs, in order of appearance.
///
/// A body that trims to a JSON object is read as `{"tags": [{"name": ..., "value": ...}]}`.
/// Anything else is read as whitespace-separated `name:value` tokens; tokens without a colon are
/// skipped.
pub fn parse_tags(text: &str) -> Result<Vec<(String, String)>, PayloadError> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        let list: TagList =
            serde_json::from_str(trimmed).map_err(|err| PayloadError::TagsJson { err })?;
        return Ok(list
            .tags
            .into_iter()
            .map(|tag| (tag.name, tag.value.into_string()))
            .collect());
    }

    Ok(trimmed
        .split_whitespace()
        .filter_map(|token| {
            let (name, value) = token.split_once(':')?;
            Some((name.to_owned(), value.to_owned()))
        })
        .collect())
}

/// Inserts tags into `tags`; later names overwrite earlier ones.
pub fn merge_tags(tags: &mut IndexMap<String, String>, parsed: Vec<(String, String)>) {
    for (name, value) in parsed {
        tags.insert(name, value);
    }
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    value: TagValue,
}

#[derive(Default, Deserialize)]
#[serde(untagged)]
enum TagValue {
    #[default]
    Null,
    Text(String),
    Other(Value),
}

impl TagValue {
    fn into_string(self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(text) => text,
            Self::Other(value) => value.to_string(),
        }
    }
}

/// The body of an execution plan message, by schema version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanPayload {
    /// Version 1: the plan tree replaces whatever plan was recorded before.
    V1(Map<String, Value>),

    /// A version this crate doesn't understand. Ignored.
    Unsupported {
        /// The `version` field as found in the payload.
        version: Value,
    },
}

impl PlanPayload {
    /// Parses the body of a plan message.
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let mut payload: Map<String, Value> =
            serde_json::from_str(text.trim()).map_err(|err| PayloadError::PlanJson { err })?;

        let version = payload
            .remove("version")
            .ok_or(PayloadError::PlanMissingVersion)?;
        if version.as_u64() != Some(1) {
            return Ok(Self::Unsupported { version });
        }

        match payload.remove("plan") {
            Some(Value::Object(plan)) => Ok(Self::V1(plan)),
            _ => Err(PayloadError::PlanNotObject),
        }
    }
}
