// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use te_log_import::errors::{ConfigParseError, ParseError};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `xml-log-parser` failures.
///
/// Unknown or unexpected failures always result in exit code 1.
pub enum XmlLogParserExitCode {}

impl XmlLogParserExitCode {
    /// The log was converted and written out.
    pub const OK: i32 = 0;

    /// The configuration could not be loaded.
    pub const SETUP_ERROR: i32 = 96;

    /// The log could not be read, or its structure is malformed.
    pub const PARSE_FAILED: i32 = 97;

    /// The document could not be written to standard output.
    pub const WRITE_FAILED: i32 = 98;
}

// The #[error()] strings are placeholders. Errors are meant to be printed with display_to_stderr,
// which styles them and prints their causes.

/// An error that the converter expects and reports without a backtrace.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to parse log")]
    ParseFailed {
        path: Utf8PathBuf,
        #[source]
        err: ParseError,
    },
    #[error("failed to write output")]
    WriteFailed {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. } => XmlLogParserExitCode::SETUP_ERROR,
            Self::ParseFailed { .. } => XmlLogParserExitCode::PARSE_FAILED,
            Self::WriteFailed { .. } => XmlLogParserExitCode::WRITE_FAILED,
        }
    }

    /// Displays this error to stderr, followed by its chain of causes.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::ParseFailed { path, err } => {
                error!("failed to convert `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::WriteFailed { err } => {
                error!("failed to write the document to standard output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
