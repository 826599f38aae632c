// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while importing a test log.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::io;
use thiserror::Error;

/// A fatal error that aborts the import of a run.
///
/// No partial document is returned when one of these occurs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The input log could not be opened.
    #[error("failed to open log file `{path}`")]
    Open {
        /// The path that was being opened.
        path: Utf8PathBuf,

        /// The underlying I/O error.
        #[source]
        err: io::Error,
    },

    /// The XML reader failed.
    #[error("malformed XML at byte {position}")]
    Xml {
        /// Byte offset into the input at which the error was detected.
        position: u64,

        /// The underlying reader error.
        #[source]
        err: quick_xml::Error,
    },

    /// An element was closed while no element was open.
    #[error("end of element `{name}` without a matching start")]
    UnmatchedEnd {
        /// The name of the element being closed.
        name: String,
    },

    /// An element was closed while a different element was innermost.
    #[error("end of element `{found}` while `{expected}` is open")]
    MismatchedEnd {
        /// The innermost open element.
        expected: String,

        /// The element that was closed.
        found: String,
    },

    /// The event stream ended while elements were still open.
    #[error("log ended with unclosed elements: {}", .open.join(" > "))]
    Unclosed {
        /// The open elements, outermost first.
        open: Vec<String>,
    },
}

impl ParseError {
    pub(crate) fn xml(position: u64, err: impl Into<quick_xml::Error>) -> Self {
        Self::Xml {
            position,
            err: err.into(),
        }
    }
}

/// An out-of-band message block carried a payload that could not be understood.
///
/// These are recovered from: the block is skipped and previously collected tags or plan data are
/// kept.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PayloadError {
    /// A tag block looked like JSON but did not parse.
    #[error("tag block is not a valid JSON tag list")]
    TagsJson {
        /// The JSON error.
        #[source]
        err: serde_json::Error,
    },

    /// A plan block did not parse as JSON.
    #[error("execution plan block is not valid JSON")]
    PlanJson {
        /// The JSON error.
        #[source]
        err: serde_json::Error,
    },

    /// A plan block has no `version` field.
    #[error("execution plan block has no `version` field")]
    PlanMissingVersion,

    /// A version 1 plan block whose `plan` field is missing or is not an object.
    #[error("execution plan version 1 does not carry a `plan` object")]
    PlanNotObject,
}

/// A clock reading (`start-ts`, `end-ts` or `duration`) could not be parsed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid {kind} reading `{input}`")]
pub struct ClockReadingError {
    kind: &'static str,
    input: String,
}

impl ClockReadingError {
    pub(crate) fn new(kind: &'static str, input: impl Into<String>) -> Self {
        Self {
            kind,
            input: input.into(),
        }
    }
}

/// An error that occurred while reading the import config.
#[derive(Debug, Error)]
#[error("failed to parse import config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// Error returned while parsing a [`TimestampStrategy`](crate::TimestampStrategy) from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for timestamp strategy: {input}\n(known values: {})",
    crate::TimestampStrategy::variants().join(", "),
)]
pub struct TimestampStrategyParseError {
    input: String,
}

impl TimestampStrategyParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// The stored execution plan does not describe a plan tree.
#[derive(Debug, Error)]
#[error("execution plan is not a valid plan tree")]
pub struct PlanError {
    #[source]
    err: serde_json::Error,
}

impl PlanError {
    pub(crate) fn new(err: serde_json::Error) -> Self {
        Self { err }
    }
}
