// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    builder::LogBuilder, config::ImportConfig, document::ParsedDocument, errors::ParseError,
    events::drive_xml,
};
use camino::Utf8Path;
use std::{
    fs::File,
    io::{BufRead, BufReader},
};
use tracing::debug;

/// Parses TE XML logs into [`ParsedDocument`]s.
///
/// Each call parses one independent run. Nothing is shared between runs except the configuration.
#[derive(Clone, Debug, Default)]
pub struct LogParser {
    config: ImportConfig,
}

impl LogParser {
    /// Creates a parser with the given configuration.
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration this parser uses.
    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Parses a log from a buffered reader.
    pub fn parse_reader(&self, input: impl BufRead) -> Result<ParsedDocument, ParseError> {
        let mut builder = LogBuilder::new(&self.config);
        drive_xml(input, &mut builder)?;
        let document = builder.finish()?;
        debug!(
            "parsed {} top-level nodes, {} tags",
            document.iters.len(),
            document.tags.len()
        );
        Ok(document)
    }

    /// Parses a log held in memory.
    pub fn parse_str(&self, input: &str) -> Result<ParsedDocument, ParseError> {
        self.parse_reader(input.as_bytes())
    }

    /// Parses the log file at `path`.
    pub fn parse_file(&self, path: &Utf8Path) -> Result<ParsedDocument, ParseError> {
        let file = File::open(path).map_err(|err| ParseError::Open {
            path: path.to_owned(),
            err,
        })?;
        debug!("parsing {path}");
        self.parse_reader(BufReader::new(file))
    }
}
