// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line converter from TE XML execution logs to JSON run documents.
//!
//! The conversion itself lives in [`te_log_import`]; this crate handles arguments, configuration
//! overrides, diagnostics and exit codes.

#![warn(missing_docs)]

mod app;
mod errors;
mod output;

#[doc(hidden)]
pub use app::XmlLogParserApp;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, StderrStyles};
