// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run document produced by an import.

use crate::{
    errors::PlanError,
    plan::PlanItem,
    timestamp::{ClockReadings, serde_timestamp},
};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of numeric identifiers that are absent from the log.
pub const ABSENT_ID: i64 = -1;

/// The structured result of importing one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Top-level nodes, normally a single session.
    pub iters: Vec<Node>,

    /// Run-wide TRC tags.
    pub tags: IndexMap<String, String>,

    /// The execution plan of the run, empty if none of a supported version was found.
    pub plan: serde_json::Map<String, serde_json::Value>,

    /// The earliest resolved start of any node.
    #[serde(with = "serde_timestamp")]
    pub start_ts: Option<NaiveDateTime>,

    /// The latest resolved end of any node.
    #[serde(with = "serde_timestamp")]
    pub end_ts: Option<NaiveDateTime>,
}

impl ParsedDocument {
    /// Returns the execution plan as a typed tree, or `None` if the run has no plan.
    pub fn execution_plan(&self) -> Result<Option<PlanItem>, PlanError> {
        if self.plan.is_empty() {
            return Ok(None);
        }
        PlanItem::from_json(&self.plan).map(Some)
    }

    /// Iterates over every node of the document in pre-order.
    pub fn walk(&self) -> impl Iterator<Item = &Node> {
        let mut stack: Vec<&Node> = self.iters.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.iters.iter().rev());
            Some(node)
        })
    }
}

/// The kind of a node in the execution hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A test package.
    Package,
    /// A session grouping tests inside a package.
    Session,
    /// A single test iteration.
    Test,
}

impl NodeType {
    /// Returns the node type for a container element name.
    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "package" => Some(Self::Package),
            "session" => Some(Self::Session),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    /// The element name this node type is read from.
    pub fn element_name(self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Session => "session",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// One package, session or test iteration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The `name` attribute, empty if absent.
    pub name: String,

    /// The type of the node.
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Names from the outermost package down to this node. Sessions do not contribute.
    pub path: Vec<String>,

    /// `path` joined with `/`.
    pub path_str: String,

    /// Opaque iteration hash, empty if absent.
    pub hash: String,

    /// Test iteration number, [`ABSENT_ID`] if absent.
    pub tin: i64,

    /// Test identifier, [`ABSENT_ID`] if absent.
    pub test_id: i64,

    /// Position in the execution plan, [`ABSENT_ID`] if absent.
    pub plan_id: i64,

    /// Obtained result class, empty if absent.
    pub result: String,

    /// Obtained error text.
    pub err: String,

    /// Expected result class: empty if no expectation was recorded, otherwise an uppercase
    /// result class or `default`.
    pub expected_result: String,

    /// Free-text objective.
    pub objective: String,

    /// Obtained verdicts, in order.
    pub verdicts: Vec<String>,

    /// Expected verdicts, in order.
    pub verdicts_expected: Vec<String>,

    /// Artifacts, in order.
    pub artifacts: Vec<String>,

    /// Requirement identifiers, in order.
    pub reqs: Vec<String>,

    /// Iteration parameters.
    pub params: IndexMap<String, String>,

    /// Resolved start.
    #[serde(with = "serde_timestamp")]
    pub start_ts: Option<NaiveDateTime>,

    /// Resolved end.
    #[serde(with = "serde_timestamp")]
    pub end_ts: Option<NaiveDateTime>,

    /// Tag expression from the expected results paragraph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_expression: Option<String>,

    /// Keys from the result message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,

    /// Notes from the result message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Child nodes, in document order.
    pub iters: Vec<Node>,

    /// Clock readings awaiting resolution at the end of the stream.
    #[serde(skip)]
    pub(crate) clock: ClockReadings,
}

impl Node {
    /// Creates a node with every field at its default.
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            path: Vec::new(),
            path_str: String::new(),
            hash: String::new(),
            tin: ABSENT_ID,
            test_id: ABSENT_ID,
            plan_id: ABSENT_ID,
            result: String::new(),
            err: String::new(),
            expected_result: String::new(),
            objective: String::new(),
            verdicts: Vec::new(),
            verdicts_expected: Vec::new(),
            artifacts: Vec::new(),
            reqs: Vec::new(),
            params: IndexMap::new(),
            start_ts: None,
            end_ts: None,
            tag_expression: None,
            keys: None,
            notes: None,
            iters: Vec::new(),
            clock: ClockReadings::default(),
        }
    }

    /// Sets the path and derives `path_str` from it.
    pub fn set_path(&mut self, path: Vec<String>) -> &mut Self {
        self.path_str = path.join("/");
        self.path = path;
        self
    }

    /// Inserts a parameter, replacing an earlier value with the same name.
    pub fn add_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Returns the number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.iters.iter().map(Node::subtree_len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use maplit::hashset;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_document() -> ParsedDocument {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).and_then(|d| d.and_hms_opt(23, 58, 0));

        let mut test = Node::new("ping", NodeType::Test);
        test.set_path(vec!["suite".to_owned(), "ping".to_owned()]);
        test.add_param("size", "64").add_param("count", "3");
        test.tin = 7;
        test.verdicts.push("timeout".to_owned());
        test.keys = Some("BUG-1".to_owned());
        test.start_ts = start;

        let mut session = Node::new("", NodeType::Session);
        session.set_path(vec!["suite".to_owned()]);
        session.iters.push(test);

        let mut package = Node::new("suite", NodeType::Package);
        package.set_path(vec!["suite".to_owned()]);
        package.iters.push(session);

        let mut document = ParsedDocument::default();
        document.iters.push(package);
        document.tags.insert("TESTER".to_owned(), "run".to_owned());
        document.plan.insert("name".to_owned(), json!("suite"));
        document.start_ts = start;
        document
    }

    #[test]
    fn serializes_external_shape() {
        let value = serde_json::to_value(sample_document()).expect("serializes");

        assert_eq!(value["start_ts"], json!("2023.06.01 23:58:00"));
        assert_eq!(value["end_ts"], json!(null));
        assert_eq!(value["tags"], json!({"TESTER": "run"}));
        assert_eq!(value["plan"], json!({"name": "suite"}));

        let test = &value["iters"][0]["iters"][0]["iters"][0];
        assert_eq!(test["type"], json!("test"));
        assert_eq!(test["path"], json!(["suite", "ping"]));
        assert_eq!(test["path_str"], json!("suite/ping"));
        assert_eq!(test["params"], json!({"size": "64", "count": "3"}));
        assert_eq!(test["tin"], json!(7));
        assert_eq!(test["test_id"], json!(-1));
        assert_eq!(test["keys"], json!("BUG-1"));
        assert_eq!(test["iters"], json!([]));

        let keys: std::collections::HashSet<_> = test
            .as_object()
            .expect("node is an object")
            .keys()
            .map(String::as_str)
            .collect();
        assert!(keys.is_superset(&hashset! {"verdicts", "verdicts_expected", "artifacts", "reqs"}));
        assert!(!keys.contains("notes"), "absent notes are omitted");
        assert!(!keys.contains("clock"), "clock readings are internal");
    }

    #[test]
    fn reserialization_is_lossless() {
        let document = sample_document();
        let text = serde_json::to_string(&document).expect("serializes");
        let reparsed: ParsedDocument = serde_json::from_str(&text).expect("deserializes");
        assert_eq!(reparsed, document);
        assert_eq!(serde_json::to_string(&reparsed).expect("serializes"), text);
    }

    #[test]
    fn walk_is_preorder() {
        let document = sample_document();
        let names: Vec<_> = document
            .walk()
            .map(|node| (node.node_type, node.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                (NodeType::Package, "suite"),
                (NodeType::Session, ""),
                (NodeType::Test, "ping"),
            ]
        );
        assert_eq!(document.iters[0].subtree_len(), 3);
    }

    #[test]
    fn missing_plan_is_none() {
        let document = ParsedDocument::default();
        assert!(matches!(document.execution_plan(), Ok(None)));
    }
}
