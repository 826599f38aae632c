// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Converts the XML execution logs written by the TE test framework into structured run
//! documents.
//!
//! A log is a stream of nested `package`, `session` and `test` elements interleaved with `msg`
//! elements. [`LogParser`] drives an XML reader over the stream and produces a
//! [`ParsedDocument`]: the node tree with reconstructed absolute timestamps, the run's TRC tags
//! and its execution plan.
//!
//! ```
//! use te_log_import::LogParser;
//!
//! let log = r#"<proteos:log_report>
//!   <package name="suite"><test name="ping" result="PASSED"/></package>
//! </proteos:log_report>"#;
//! let document = LogParser::default().parse_str(log).unwrap();
//! assert_eq!(document.iters[0].iters[0].path_str, "suite/ping");
//! ```

mod builder;
pub mod classify;
pub mod config;
pub mod document;
pub mod errors;
pub mod events;
mod parser;
pub mod payload;
pub mod plan;
pub mod timestamp;

pub use builder::LogBuilder;
pub use config::ImportConfig;
pub use document::{Node, NodeType, ParsedDocument};
pub use parser::LogParser;
pub use timestamp::TimestampStrategy;
