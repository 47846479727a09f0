//! Role groups and tag classification.

use crate::error::{Error, Result};
use crate::network::ComputationNode;
use crate::runtime::ElemType;
use serde::Serialize;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleGroup {
    Feature,
    Label,
    Criterion,
    Evaluation,
    Output,
    Pair,
    MultiSeq,
}

impl RoleGroup {
    pub const ALL: [RoleGroup; 7] = [
        RoleGroup::Feature,
        RoleGroup::Label,
        RoleGroup::Criterion,
        RoleGroup::Evaluation,
        RoleGroup::Output,
        RoleGroup::Pair,
        RoleGroup::MultiSeq,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleGroup::Feature => "feature",
            RoleGroup::Label => "label",
            RoleGroup::Criterion => "criterion",
            RoleGroup::Evaluation => "evaluation",
            RoleGroup::Output => "output",
            RoleGroup::Pair => "pair",
            RoleGroup::MultiSeq => "multiseq",
        }
    }

    /// Map a tag to its group. Empty means "no role"; anything unrecognized is an error.
    ///
    /// Matching is case-sensitive, except for evaluation tags which only need to start
    /// with `eval` in any case (`evalAccuracy`, `EvalErr`). `criteria` is accepted as an
    /// older spelling of `criterion`.
    pub fn from_tag(tag: &str) -> Result<Option<RoleGroup>> {
        let group = match tag {
            "" => return Ok(None),
            "feature" => RoleGroup::Feature,
            "label" => RoleGroup::Label,
            "criterion" | "criteria" => RoleGroup::Criterion,
            t if t.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("eval")) => {
                RoleGroup::Evaluation
            }
            "output" => RoleGroup::Output,
            "pair" => RoleGroup::Pair,
            "multiseq" => RoleGroup::MultiSeq,
            other => return Err(Error::construction(format!("unknown tag '{}'", other))),
        };
        Ok(Some(group))
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Nodes partitioned by role, each group in discovery order.
#[derive(Debug)]
pub struct RoleGroups<E: ElemType> {
    groups: [Vec<Rc<ComputationNode<E>>>; 7],
}

impl<E: ElemType> RoleGroups<E> {
    pub fn new() -> Self {
        Self {
            groups: Default::default(),
        }
    }

    /// Append `node` to the group named by `tag`, if any.
    pub fn classify(&mut self, node: &Rc<ComputationNode<E>>, tag: &str) -> Result<Option<RoleGroup>> {
        let group = RoleGroup::from_tag(tag)?;
        if let Some(group) = group {
            self.groups[group.index()].push(node.clone());
        }
        Ok(group)
    }

    pub fn get(&self, group: RoleGroup) -> &[Rc<ComputationNode<E>>] {
        &self.groups[group.index()]
    }

    pub fn names(&self, group: RoleGroup) -> Vec<String> {
        self.get(group).iter().map(|n| n.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoleGroup, &[Rc<ComputationNode<E>>])> {
        RoleGroup::ALL.into_iter().map(move |g| (g, self.get(g)))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }
}

impl<E: ElemType> Default for RoleGroups<E> {
    fn default() -> Self {
        Self::new()
    }
}
