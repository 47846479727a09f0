use crate::network::{ComputationNetwork, ComputationNode, NodeDetail};
use crate::runtime::{BuildStats, ElemType, Precision, Taggable};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Serializable view of a built network.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub precision: Precision,
    pub device_id: i32,
    pub nodes: Vec<NodeView>,
    /// Non-empty role groups only, member names in discovery order.
    pub groups: BTreeMap<String, Vec<String>>,
    pub stats: BuildStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub name: String,
    pub operation: String,
    pub inputs: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<[usize; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
}

impl NodeView {
    fn from_node<E: ElemType>(node: &ComputationNode<E>) -> Self {
        let init = match node.detail() {
            NodeDetail::Parameter { init, .. } => Some(format!("{:?}", init)),
            NodeDetail::Delay(state) => Some(format!("deltaT={}", state.delta_t())),
            NodeDetail::RowSlice { first, num } => Some(format!("first={} num={}", first, num)),
            _ => None,
        };
        Self {
            name: node.name(),
            operation: node.kind().as_str().to_string(),
            inputs: node.input_names(),
            tag: node.tag(),
            shape: node.shape().map(|(rows, cols)| [rows, cols]),
            init,
        }
    }
}

impl NetworkSummary {
    pub fn from_network<E: ElemType>(network: &ComputationNetwork<E>, stats: BuildStats) -> Self {
        let groups = network
            .groups()
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(group, members)| {
                let names: Vec<String> = members.iter().map(|n| n.name()).collect();
                (group.as_str().to_string(), names)
            })
            .collect();
        Self {
            precision: network.precision(),
            device_id: network.device_id(),
            nodes: network.nodes().map(|n| NodeView::from_node(n)).collect(),
            groups,
            stats,
        }
    }
}

/// Plain-text table of the network, one node per line.
pub fn render_text(summary: &NetworkSummary) -> String {
    let width = summary.nodes.iter().map(|n| n.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} node(s), precision {}, device {}",
        summary.nodes.len(),
        summary.precision,
        summary.device_id
    );
    for node in &summary.nodes {
        let _ = write!(out, "  {:<width$}  {}", node.name, node.operation, width = width);
        if !node.inputs.is_empty() {
            let _ = write!(out, "({})", node.inputs.join(", "));
        }
        if let Some([rows, cols]) = node.shape {
            let _ = write!(out, " [{} x {}]", rows, cols);
        }
        if !node.tag.is_empty() {
            let _ = write!(out, " {{{}}}", node.tag);
        }
        out.push('\n');
    }
    for (group, names) in &summary.groups {
        let _ = writeln!(out, "{}: {}", group, names.join(", "));
    }
    let _ = writeln!(
        out,
        "{} constructed, {} finalized, {} randomized",
        summary.stats.constructed, summary.stats.finalized, summary.stats.randomized
    );
    out
}

pub fn render_json(summary: &NetworkSummary) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}
