// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    errors::XmlLogParserExitCode,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::Utf8PathBuf;
use chrono::FixedOffset;
use clap::Parser;
use std::io::Write;
use te_log_import::{ImportConfig, LogParser, ParsedDocument, TimestampStrategy};
use tracing::{debug, info, warn};

/// Converts a TE XML execution log into a JSON run document.
///
/// The document is written to standard output. Diagnostics go to standard error; set
/// XML_LOG_PARSER_LOG to a tracing filter such as `te_log_import=debug` for more detail.
#[derive(Debug, Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct XmlLogParserApp {
    /// Path to the XML log
    #[arg(value_name = "LOG")]
    log: Utf8PathBuf,

    /// Config file layered over the built-in defaults
    #[arg(long, value_name = "PATH", env = "XML_LOG_PARSER_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// How end timestamps are computed: duration, direct [default: from config]
    #[arg(long, value_name = "STRATEGY")]
    timestamp_strategy: Option<TimestampStrategy>,

    /// UTC offset of the log's wall clock, e.g. "+03:00" [default: from config]
    #[arg(long, value_name = "OFFSET", allow_hyphen_values = true)]
    utc_offset: Option<FixedOffset>,

    /// Pretty-print the JSON document
    #[arg(long)]
    pretty: bool,

    #[clap(flatten)]
    output: OutputOpts,
}

impl XmlLogParserApp {
    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output_writer: &mut OutputWriter) -> Result<i32> {
        let config = self.load_config()?;
        let parser = LogParser::new(config);

        let document = parser
            .parse_file(&self.log)
            .map_err(|err| ExpectedError::ParseFailed {
                path: self.log.clone(),
                err,
            })?;
        log_plan_summary(&document);

        let mut writer = output_writer.stdout_writer();
        let written = if self.pretty {
            serde_json::to_writer_pretty(&mut writer, &document)
        } else {
            serde_json::to_writer(&mut writer, &document)
        };
        written
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(writer))
            .and_then(|()| writer.flush())
            .map_err(|err| ExpectedError::WriteFailed { err })?;

        Ok(XmlLogParserExitCode::OK)
    }

    fn load_config(&self) -> Result<ImportConfig> {
        let mut config = ImportConfig::from_sources(self.config.as_deref())?;
        if let Some(strategy) = self.timestamp_strategy {
            config.timestamps.strategy = strategy;
        }
        if let Some(offset) = self.utc_offset {
            config.timestamps.utc_offset = offset;
        }
        debug!(
            "timestamps: strategy {}, UTC offset {}",
            config.timestamps.strategy, config.timestamps.utc_offset
        );
        Ok(config)
    }
}

fn log_plan_summary(document: &ParsedDocument) {
    match document.execution_plan() {
        Ok(Some(plan)) => info!(
            "execution plan expects {} tests ({} plan items)",
            plan.tests_num(),
            plan.tree_nodes_num()
        ),
        Ok(None) => debug!("log carries no execution plan"),
        Err(err) => warn!("{err}"),
    }
}
