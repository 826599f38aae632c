// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stack machine that turns log events into a [`ParsedDocument`].

use crate::{
    classify::OutcomeClassifier,
    config::ImportConfig,
    document::{ABSENT_ID, Node, NodeType, ParsedDocument},
    errors::ParseError,
    events::{Attributes, LogEventHandler},
    payload::{PlanPayload, merge_tags, parse_tags},
    timestamp::{Anchor, ClockReadings, TimestampReconciler, parse_elapsed, parse_time_of_day},
};
use chrono::NaiveDateTime;
use display_error_chain::DisplayErrorChain;
use indexmap::IndexMap;
use std::mem;
use tracing::{debug, info, warn};

static START_TS_TAG: &str = "start-ts";
static END_TS_TAG: &str = "end-ts";
static DURATION_TAG: &str = "duration";
static OBJECTIVE_TAG: &str = "objective";
static VERDICT_TAG: &str = "verdict";
static ARTIFACT_TAG: &str = "artifact";
static PARAM_TAG: &str = "param";
static REQ_TAG: &str = "req";
static MSG_TAG: &str = "msg";
static BR_TAG: &str = "br";

/// Text collected for the innermost leaf element. Reset at every start event.
#[derive(Debug, Default)]
struct Scratch {
    start_ts: String,
    end_ts: String,
    duration: String,
    objective: String,
    verdict: String,
    artifact: String,
}

impl Scratch {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn push_text(&mut self, element: &str, text: &str) {
        let buffer = match element {
            e if e == START_TS_TAG => &mut self.start_ts,
            e if e == END_TS_TAG => &mut self.end_ts,
            e if e == DURATION_TAG => &mut self.duration,
            e if e == VERDICT_TAG => &mut self.verdict,
            e if e == ARTIFACT_TAG => &mut self.artifact,
            e if e == OBJECTIVE_TAG => {
                if !self.objective.is_empty() {
                    self.objective.push('\n');
                }
                &mut self.objective
            }
            _ => return,
        };
        buffer.push_str(text);
    }
}

/// The body of a recognized message, collected until the message closes.
#[derive(Debug)]
enum Capture {
    Outcome { lines: Vec<String>, line: String },
    Tags(String),
    Plan(String),
}

impl Capture {
    fn push_text(&mut self, text: &str) {
        match self {
            Self::Outcome { line, .. } => line.push_str(text),
            Self::Tags(body) | Self::Plan(body) => body.push_str(text),
        }
    }

    fn line_break(&mut self) {
        match self {
            Self::Outcome { lines, line } => lines.push(mem::take(line)),
            Self::Tags(body) | Self::Plan(body) => body.push('\n'),
        }
    }
}

#[derive(Debug)]
struct OpenMessage {
    // Number of elements open outside the message.
    depth: usize,
    capture: Capture,
}

/// Builds one run document from a stream of log events.
///
/// Feed it through [`LogEventHandler`], then call [`finish`](Self::finish) once the stream ends.
#[derive(Debug)]
pub struct LogBuilder {
    config: ImportConfig,
    elements: Vec<String>,
    // Nodes under construction, outermost first.
    nodes: Vec<Node>,
    path: Vec<String>,
    top_level: Vec<Node>,
    scratch: Scratch,
    message: Option<OpenMessage>,
    anchor: Option<Anchor>,
    tags: IndexMap<String, String>,
    plan: serde_json::Map<String, serde_json::Value>,
}

impl LogBuilder {
    /// Creates a builder for one run.
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            config: config.clone(),
            elements: Vec::new(),
            nodes: Vec::new(),
            path: Vec::new(),
            top_level: Vec::new(),
            scratch: Scratch::default(),
            message: None,
            anchor: None,
            tags: IndexMap::new(),
            plan: serde_json::Map::new(),
        }
    }

    /// Completes the document: checks that every element was closed and resolves timestamps.
    pub fn finish(self) -> Result<ParsedDocument, ParseError> {
        if !self.elements.is_empty() {
            return Err(ParseError::Unclosed {
                open: self.elements,
            });
        }

        let strategy = self.config.timestamps.strategy;
        let reconciler = match self.anchor {
            Some(anchor) => Some(TimestampReconciler::new(anchor, strategy)),
            None => {
                if self.top_level.iter().any(has_readings) {
                    warn!("no message carries a `ts_val` anchor, timestamps are left unset");
                }
                None
            }
        };

        let mut document = ParsedDocument {
            iters: self.top_level,
            tags: self.tags,
            plan: self.plan,
            start_ts: None,
            end_ts: None,
        };

        let mut bounds = Bounds::default();
        for node in &mut document.iters {
            resolve_timestamps(node, reconciler.as_ref(), &mut bounds);
        }
        document.start_ts = bounds.start;
        document.end_ts = bounds.end;

        Ok(document)
    }

    fn open_node(&mut self, node_type: NodeType, attrs: &Attributes) {
        let name = attrs.get("name").unwrap_or_default();
        if node_type != NodeType::Session {
            self.path.push(name.to_owned());
        }

        let mut node = Node::new(name, node_type);
        node.set_path(self.path.clone());
        node.hash = attrs.get("hash").unwrap_or_default().to_owned();
        node.tin = id_attr(attrs, "tin");
        node.test_id = id_attr(attrs, "test_id");
        node.plan_id = id_attr(attrs, "plan_id");
        node.result = attrs.get("result").unwrap_or_default().to_owned();
        node.err = attrs.get("err").unwrap_or_default().to_owned();

        self.nodes.push(node);
    }

    fn close_node(&mut self) {
        // The element stack guarantees a node is open here.
        let Some(node) = self.nodes.pop() else {
            return;
        };
        if node.node_type != NodeType::Session {
            self.path.pop();
        }
        match self.nodes.last_mut() {
            Some(parent) => parent.iters.push(node),
            None => self.top_level.push(node),
        }
    }

    fn open_message(&mut self, attrs: &Attributes) {
        if self.anchor.is_none()
            && let Some(ts_val) = attrs.get("ts_val")
        {
            match Anchor::parse_ts_val(ts_val, self.config.timestamps.utc_offset) {
                Some(anchor) => {
                    info!("run anchored at {}", anchor.at());
                    self.anchor = Some(anchor);
                }
                None => warn!("ignoring invalid ts_val `{ts_val}`"),
            }
        }

        if self.message.is_some() {
            return;
        }

        let (entity, user) = (attrs.get("entity"), attrs.get("user"));
        let sources = &self.config.messages;
        let capture = if sources.outcome.matches(entity, user) {
            Capture::Outcome {
                lines: Vec::new(),
                line: String::new(),
            }
        } else if sources.tags.matches(entity, user) {
            Capture::Tags(String::new())
        } else if sources.plan.matches(entity, user) {
            Capture::Plan(String::new())
        } else {
            return;
        };

        self.message = Some(OpenMessage {
            depth: self.elements.len() - 1,
            capture,
        });
    }

    fn close_message(&mut self, capture: Capture) {
        match capture {
            Capture::Outcome { mut lines, line } => {
                lines.push(line);
                match self.nodes.last_mut() {
                    Some(node) => {
                        OutcomeClassifier::classify_all(node, lines.iter().map(String::as_str))
                    }
                    None => debug!("outcome message outside of any node, skipping"),
                }
            }
            Capture::Tags(body) => match parse_tags(&body) {
                Ok(parsed) => merge_tags(&mut self.tags, parsed),
                Err(err) => warn!("skipping tag block: {}", DisplayErrorChain::new(&err)),
            },
            Capture::Plan(body) => match PlanPayload::parse(&body) {
                Ok(PlanPayload::V1(plan)) => {
                    debug!("execution plan replaced");
                    self.plan = plan;
                }
                Ok(PlanPayload::Unsupported { version }) => {
                    info!("ignoring execution plan with unsupported version {version}");
                }
                Err(err) => warn!("skipping execution plan: {}", DisplayErrorChain::new(&err)),
            },
        }
    }

    fn record_clock(&mut self, element: &str) {
        let Some(node) = self.nodes.last_mut() else {
            debug!("`{element}` outside of any node, skipping");
            return;
        };
        let clock = &mut node.clock;

        let result = match element {
            e if e == START_TS_TAG => {
                parse_time_of_day(&self.scratch.start_ts).map(|time| clock.start = Some(time))
            }
            e if e == END_TS_TAG => {
                parse_time_of_day(&self.scratch.end_ts).map(|time| clock.end = Some(time))
            }
            _ => {
                parse_elapsed(&self.scratch.duration).map(|elapsed| clock.duration = Some(elapsed))
            }
        };
        if let Err(err) = result {
            warn!("{} `{}`: {err}", node.node_type, node.path_str);
        }
    }
}

impl LogEventHandler for LogBuilder {
    fn on_start(&mut self, name: &str, attrs: &Attributes) -> Result<(), ParseError> {
        self.scratch.clear();
        self.elements.push(name.to_owned());

        if let Some(node_type) = NodeType::from_element(name) {
            self.open_node(node_type, attrs);
            return Ok(());
        }

        match name {
            n if n == PARAM_TAG => match (self.nodes.last_mut(), attrs.get("name")) {
                (Some(node), Some(param)) => {
                    node.add_param(param, attrs.get("value").unwrap_or_default());
                }
                _ => debug!("ignoring param outside of a node or without a name"),
            },
            n if n == REQ_TAG => match (self.nodes.last_mut(), attrs.get("id")) {
                (Some(node), Some(id)) => node.reqs.push(id.to_owned()),
                _ => debug!("ignoring req outside of a node or without an id"),
            },
            n if n == MSG_TAG => self.open_message(attrs),
            n if n == BR_TAG => {
                if let Some(message) = &mut self.message {
                    message.capture.line_break();
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn on_char(&mut self, text: &str) -> Result<(), ParseError> {
        if let Some(message) = &mut self.message {
            message.capture.push_text(text);
        }
        if let Some(element) = self.elements.last() {
            self.scratch.push_text(element, text);
        }
        Ok(())
    }

    fn on_end(&mut self, name: &str) -> Result<(), ParseError> {
        match self.elements.pop() {
            None => {
                return Err(ParseError::UnmatchedEnd {
                    name: name.to_owned(),
                });
            }
            Some(open) if open != name => {
                return Err(ParseError::MismatchedEnd {
                    expected: open,
                    found: name.to_owned(),
                });
            }
            Some(_) => {}
        }

        if NodeType::from_element(name).is_some() {
            self.close_node();
            return Ok(());
        }

        match name {
            n if n == START_TS_TAG || n == END_TS_TAG || n == DURATION_TAG => self.record_clock(n),
            n if n == OBJECTIVE_TAG => {
                let objective = mem::take(&mut self.scratch.objective);
                if let Some(node) = self.nodes.last_mut() {
                    node.objective = objective;
                }
            }
            n if n == VERDICT_TAG => {
                let verdict = mem::take(&mut self.scratch.verdict);
                if let Some(node) = self.nodes.last_mut() {
                    node.verdicts.push(verdict);
                }
            }
            n if n == ARTIFACT_TAG => {
                let artifact = mem::take(&mut self.scratch.artifact);
                if let Some(node) = self.nodes.last_mut() {
                    node.artifacts.push(artifact);
                }
            }
            n if n == MSG_TAG => {
                let closes_capture = self
                    .message
                    .as_ref()
                    .is_some_and(|message| message.depth == self.elements.len());
                if closes_capture && let Some(message) = self.message.take() {
                    self.close_message(message.capture);
                }
            }
            _ => {}
        }

        Ok(())
    }
}

fn id_attr(attrs: &Attributes, name: &str) -> i64 {
    match attrs.get(name) {
        None => ABSENT_ID,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            debug!("non-numeric {name} `{value}` treated as absent");
            ABSENT_ID
        }),
    }
}

fn has_readings(node: &Node) -> bool {
    !node.clock.is_empty() || node.iters.iter().any(has_readings)
}

#[derive(Debug, Default)]
struct Bounds {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
}

fn resolve_timestamps(
    node: &mut Node,
    reconciler: Option<&TimestampReconciler>,
    bounds: &mut Bounds,
) {
    let clock: ClockReadings = mem::take(&mut node.clock);
    if let Some(reconciler) = reconciler {
        let span = reconciler.resolve(&clock);
        node.start_ts = span.start;
        node.end_ts = span.end;
        if let Some(start) = span.start {
            bounds.start = Some(bounds.start.map_or(start, |earliest| earliest.min(start)));
        }
        if let Some(end) = span.end {
            bounds.end = Some(bounds.end.map_or(end, |latest| latest.max(end)));
        }
    }

    for child in &mut node.iters {
        resolve_timestamps(child, reconciler, bounds);
    }
}
