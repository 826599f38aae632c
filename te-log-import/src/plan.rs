// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A typed view of a version 1 execution plan.
//!
//! The plan describes what the run intends to execute. Children listed with an `iterations`
//! count are expanded, each repetition preceded by the parent's `keepalive` item if it has one;
//! `skipped` children do not run and are left out.

use crate::errors::PlanError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// The kind of an execution plan item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanItemType {
    /// A package.
    Package,
    /// A session.
    Session,
    /// A test.
    Test,
    /// An item that will not be executed.
    Skipped,
    /// A type this crate doesn't know about.
    Other(String),
}

impl PlanItemType {
    fn from_raw(raw: &str) -> Self {
        match raw {
            "pkg" | "package" => Self::Package,
            "session" => Self::Session,
            "test" => Self::Test,
            "skipped" => Self::Skipped,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// One item of the execution plan with its expanded children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanItem {
    /// The item name, empty if absent.
    pub name: String,
    /// The item type.
    pub item_type: PlanItemType,
    /// True if the first child is a prologue.
    pub has_prologue: bool,
    /// True if the last child is an epilogue.
    pub has_epilogue: bool,
    /// Expanded children, in execution order.
    pub children: Vec<PlanItem>,
}

#[derive(Deserialize)]
struct RawPlanItem {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    prologue: Option<Box<RawPlanItem>>,
    #[serde(default)]
    epilogue: Option<Box<RawPlanItem>>,
    #[serde(default)]
    keepalive: Option<Box<RawPlanItem>>,
    #[serde(default)]
    children: Vec<RawPlanItem>,
    #[serde(default = "default_iterations")]
    iterations: usize,
}

fn default_iterations() -> usize {
    1
}

impl PlanItem {
    /// Builds the plan tree from the `plan` object of a version 1 plan payload.
    pub fn from_json(plan: &serde_json::Map<String, serde_json::Value>) -> Result<Self, PlanError> {
        let raw: RawPlanItem = serde_json::from_value(serde_json::Value::Object(plan.clone()))
            .map_err(PlanError::new)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawPlanItem) -> Self {
        let RawPlanItem {
            name,
            item_type,
            prologue,
            epilogue,
            keepalive,
            children: raw_children,
            iterations: _,
        } = raw;

        let mut children = Vec::new();
        let has_prologue = prologue.is_some();
        if let Some(prologue) = prologue {
            children.push(Self::from_raw(*prologue));
        }

        let keepalive = keepalive.map(|keepalive| Self::from_raw(*keepalive));
        for raw_child in raw_children {
            let iterations = raw_child.iterations;
            let child = Self::from_raw(raw_child);
            for _ in 0..iterations {
                if let Some(keepalive) = &keepalive {
                    children.push(keepalive.clone());
                }
                if child.item_type != PlanItemType::Skipped {
                    children.push(child.clone());
                }
            }
        }

        let has_epilogue = epilogue.is_some();
        if let Some(epilogue) = epilogue {
            children.push(Self::from_raw(*epilogue));
        }

        Self {
            name,
            item_type: PlanItemType::from_raw(&item_type),
            has_prologue,
            has_epilogue,
            children,
        }
    }

    /// Returns the number of tests in this subtree.
    pub fn tests_num(&self) -> usize {
        if self.item_type == PlanItemType::Test {
            return 1;
        }
        self.children.iter().map(PlanItem::tests_num).sum()
    }

    /// Returns the number of items in this subtree, including this one.
    pub fn tree_nodes_num(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(PlanItem::tree_nodes_num)
            .sum::<usize>()
    }

    /// Maps the plan id of every prologue to the number of tests that won't run if it fails.
    ///
    /// Plan ids are assigned in pre-order, starting with 0 for this item. Prologues and epilogues
    /// run regardless, so they are not counted.
    pub fn tests_num_prologue(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        self.collect_prologue_counts(&mut counts, 0);
        counts
    }

    fn collect_prologue_counts(&self, counts: &mut BTreeMap<i64, usize>, plan_id: i64) {
        if self.has_prologue {
            let mut skipped = self.tests_num().saturating_sub(1);
            if self.has_epilogue {
                skipped = skipped.saturating_sub(1);
            }
            // This item's id belongs to the package or session; its prologue is the next one.
            counts.insert(plan_id + 1, skipped);
        }

        let mut child_id = plan_id + 1;
        for child in &self.children {
            child.collect_prologue_counts(counts, child_id);
            child_id += child.tree_nodes_num() as i64;
        }
    }
}
