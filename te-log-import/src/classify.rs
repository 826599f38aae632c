// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parses the human-readable outcome message the test runner writes for each test.
//!
//! The message looks like:
//!
//! ```text
//! Obtained result is:
//! FAILED with verdicts:
//! Connection refused;
//! Expected results are: TAG_EXPR
//! FAILED with verdicts:
//! Connection refused;
//! Key: BUG-123
//! Notes: flaky on slow hosts
//! ```
//!
//! The phrasing is a compatibility surface: a change in how the runner words these lines is a
//! format break, not something to paper over here.

use crate::document::Node;
use regex::{Captures, Regex};
use std::sync::LazyLock;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    None,
    ExpectedBlock,
    ActualVerdicts,
    ExpectedVerdicts,
}

type Action = fn(&mut OutcomeClassifier, &mut Node, &Captures<'_>);

struct LineRule {
    pattern: &'static str,
    action: Action,
}

// Rules are tried in order; the first match wins.
static LINE_RULES: &[LineRule] = &[
    LineRule {
        pattern: r"^Expected results are:\s*(.*)$",
        action: expected_results,
    },
    LineRule {
        pattern: r"^([A-Z][A-Z_]*) with verdicts:$",
        action: with_verdicts,
    },
    LineRule {
        pattern: r"^Key:\s*(.*)$",
        action: key,
    },
    LineRule {
        pattern: r"^Artifacts:",
        action: end_of_block,
    },
    LineRule {
        pattern: r"^Notes:\s*(.*)$",
        action: notes,
    },
    LineRule {
        pattern: r"^Obtained result is:$",
        action: end_of_block,
    },
];

static COMPILED_RULES: LazyLock<Vec<(Regex, Action)>> = LazyLock::new(|| {
    LINE_RULES
        .iter()
        .map(|rule| {
            let regex = Regex::new(rule.pattern).expect("line rule patterns are valid");
            (regex, rule.action)
        })
        .collect()
});

static RESULT_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Z][A-Z_]*|default)$").expect("pattern is valid"));

fn expected_results(state: &mut OutcomeClassifier, node: &mut Node, caps: &Captures<'_>) {
    let rest = caps[1].trim();
    if !rest.is_empty() && rest != "default" {
        node.tag_expression = Some(rest.to_owned());
    }
    state.mode = Mode::ExpectedBlock;
    state.saw_expected = true;
}

fn with_verdicts(state: &mut OutcomeClassifier, node: &mut Node, caps: &Captures<'_>) {
    if state.saw_expected {
        node.expected_result = caps[1].to_owned();
        state.mode = Mode::ExpectedVerdicts;
    } else {
        // Verdicts from the container's attributes may be incomplete; the message has them all.
        if !state.verdicts_reset {
            node.verdicts.clear();
            state.verdicts_reset = true;
        }
        state.mode = Mode::ActualVerdicts;
    }
}

fn key(state: &mut OutcomeClassifier, node: &mut Node, caps: &Captures<'_>) {
    node.keys = Some(caps[1].trim().to_owned());
    state.mode = Mode::None;
}

fn notes(state: &mut OutcomeClassifier, node: &mut Node, caps: &Captures<'_>) {
    node.notes = Some(caps[1].trim().to_owned());
    state.mode = Mode::None;
}

fn end_of_block(state: &mut OutcomeClassifier, _node: &mut Node, _caps: &Captures<'_>) {
    state.mode = Mode::None;
}

/// Line-by-line state machine over one outcome message.
#[derive(Debug, Default)]
pub struct OutcomeClassifier {
    mode: Mode,
    saw_expected: bool,
    verdicts_reset: bool,
}

impl OutcomeClassifier {
    /// Creates a classifier for a new message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies every line of a message into `node`.
    pub fn classify_all<'a>(node: &mut Node, lines: impl IntoIterator<Item = &'a str>) {
        let mut classifier = Self::new();
        for line in lines {
            classifier.feed(node, line);
        }
    }

    /// Classifies one line. Blank lines and lines that match nothing are ignored.
    pub fn feed(&mut self, node: &mut Node, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        for (regex, action) in COMPILED_RULES.iter() {
            if let Some(caps) = regex.captures(line) {
                action(self, node, &caps);
                return;
            }
        }

        match self.mode {
            Mode::ExpectedBlock => {
                if RESULT_CLASS.is_match(line) {
                    node.expected_result = line.to_owned();
                } else {
                    node.tag_expression
                        .get_or_insert_with(String::new)
                        .push_str(line);
                }
            }
            Mode::ActualVerdicts => node.verdicts.push(strip_verdict(line).to_owned()),
            Mode::ExpectedVerdicts => node.verdicts_expected.push(strip_verdict(line).to_owned()),
            Mode::None => {
                tracing::trace!(line, "outcome line matches no known shape");
            }
        }
    }
}

fn strip_verdict(line: &str) -> &str {
    line.strip_suffix(';').map_or(line, str::trim_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeType;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn classify(node: &mut Node, lines: &[&str]) {
        OutcomeClassifier::classify_all(node, lines.iter().copied());
    }

    fn test_node() -> Node {
        Node::new("t", NodeType::Test)
    }

    #[test]
    fn actual_verdicts_and_key() {
        let mut node = test_node();
        node.verdicts.push("from attributes".to_owned());

        classify(
            &mut node,
            &["PASSED with verdicts:", "Verdict one;", "Key: JIRA-1", ""],
        );

        assert_eq!(node.verdicts, vec!["Verdict one".to_owned()]);
        assert_eq!(node.keys.as_deref(), Some("JIRA-1"));
        assert_eq!(node.expected_result, "");
    }

    #[test]
    fn expected_block_leaves_actual_verdicts() {
        let mut node = test_node();
        node.verdicts.push("actual".to_owned());

        classify(
            &mut node,
            &[
                "Expected results are: FAILED",
                "FAILED with verdicts:",
                "Expected verdict;",
            ],
        );

        assert_eq!(node.expected_result, "FAILED");
        assert_eq!(node.verdicts_expected, vec!["Expected verdict".to_owned()]);
        assert_eq!(node.verdicts, vec!["actual".to_owned()]);
    }

    #[test]
    fn full_message() {
        let mut node = test_node();
        classify(
            &mut node,
            &[
                "Obtained result is:",
                "FAILED with verdicts:",
                "  Connection refused ;",
                "Retry exhausted",
                "Expected results are:",
                "linux&",
                "!bsd",
                "PASSED",
                "Key: BUG-9",
                "stray line",
                "Notes: known issue",
                "Artifacts:",
                "artifact text is read from artifact elements",
            ],
        );

        assert_eq!(
            node.verdicts,
            vec!["Connection refused".to_owned(), "Retry exhausted".to_owned()]
        );
        assert_eq!(node.tag_expression.as_deref(), Some("linux&!bsd"));
        assert_eq!(node.expected_result, "PASSED");
        assert!(node.verdicts_expected.is_empty());
        assert_eq!(node.keys.as_deref(), Some("BUG-9"));
        assert_eq!(node.notes.as_deref(), Some("known issue"));
        assert!(node.artifacts.is_empty());
    }

    #[test]
    fn verdicts_reset_once_per_message() {
        let mut node = test_node();
        node.verdicts.push("attr".to_owned());
        classify(
            &mut node,
            &[
                "PASSED with verdicts:",
                "one;",
                "FAILED with verdicts:",
                "two;",
            ],
        );
        assert_eq!(node.verdicts, vec!["one".to_owned(), "two".to_owned()]);
    }

    #[test_case("Expected results are: default", None, "" ; "default is not a tag expression")]
    #[test_case("Expected results are:", None, "" ; "empty rest")]
    #[test_case("Expected results are: x86 ", Some("x86"), "" ; "tag expression")]
    fn expected_results_header(line: &str, tag_expression: Option<&str>, expected: &str) {
        let mut node = test_node();
        classify(&mut node, &[line]);
        assert_eq!(node.tag_expression.as_deref(), tag_expression);
        assert_eq!(node.expected_result, expected);
    }

    #[test]
    fn default_result_class_in_expected_block() {
        let mut node = test_node();
        classify(&mut node, &["Expected results are:", "default"]);
        assert_eq!(node.expected_result, "default");
        assert_eq!(node.tag_expression, None);
    }

    #[test]
    fn unknown_lines_outside_blocks_are_dropped() {
        let mut node = test_node();
        classify(&mut node, &["hello", "passed with verdicts:", "x;"]);
        assert_eq!(node, test_node());
    }

    #[test_case("a;", "a" ; "semicolon")]
    #[test_case("a \t;", "a" ; "whitespace before semicolon")]
    #[test_case("a;;", "a;" ; "only one semicolon")]
    #[test_case("a", "a" ; "no semicolon")]
    fn verdict_stripping(line: &str, expected: &str) {
        assert_eq!(strip_verdict(line), expected);
    }
}
