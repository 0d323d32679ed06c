//! Graphviz DOT export of the storylet graph

use crate::graph::{GraphNode, GraphStore};
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// Configuration for DOT export
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Title for the graph
    pub title: Option<String>,
    /// Include choice text on edges
    pub show_labels: bool,
    /// Include storylet ids under titles
    pub show_ids: bool,
    /// Group nodes into one cluster per arc
    pub cluster_arcs: bool,
    /// Pin nodes at their editor positions (for `neato -n`)
    pub pin_positions: bool,
    /// Orientation: "TB" (top-bottom), "LR" (left-right)
    pub rankdir: String,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            title: None,
            show_labels: true,
            show_ids: false,
            cluster_arcs: true,
            pin_positions: false,
            rankdir: "LR".to_string(),
        }
    }
}

/// Escape a string for DOT labels
fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Truncate to `max_chars` characters, marking the cut with "..."
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Convert the editor graph to DOT format
pub fn graph_to_dot(graph: &GraphStore, config: &DotConfig) -> String {
    let mut dot = String::new();
    if let Err(e) = write_dot(&mut dot, graph, config) {
        tracing::warn!(error = %e, "DOT rendering stopped early");
    }
    dot
}

fn write_dot(dot: &mut String, graph: &GraphStore, config: &DotConfig) -> fmt::Result {
    writeln!(dot, "digraph Storylets {{")?;
    writeln!(dot, "  rankdir={};", config.rankdir)?;
    writeln!(dot, "  node [fontname=\"Arial\" fontsize=10 shape=\"box\" style=\"rounded,filled\" fillcolor=\"#F5F5F5\"];")?;
    writeln!(dot, "  edge [fontname=\"Arial\" fontsize=9];")?;
    if let Some(title) = &config.title {
        writeln!(dot, "  label=\"{}\";", escape_dot(title))?;
        writeln!(dot, "  labelloc=t;")?;
    }
    writeln!(dot)?;

    if config.cluster_arcs {
        let mut by_arc: BTreeMap<Option<&str>, Vec<&GraphNode>> = BTreeMap::new();
        for node in graph.nodes() {
            by_arc.entry(node.data.arc_name.as_deref()).or_default().push(node);
        }
        for (index, (arc, nodes)) in by_arc.into_iter().enumerate() {
            match arc {
                Some(name) => {
                    writeln!(dot, "  subgraph cluster_{} {{", index)?;
                    writeln!(dot, "    label=\"{}\";", escape_dot(name))?;
                    for node in nodes {
                        write_node(dot, "    ", node, config)?;
                    }
                    writeln!(dot, "  }}")?;
                }
                None => {
                    for node in nodes {
                        write_node(dot, "  ", node, config)?;
                    }
                }
            }
        }
    } else {
        for node in graph.nodes() {
            write_node(dot, "  ", node, config)?;
        }
    }
    writeln!(dot)?;

    for connection in graph.connections() {
        let mut attrs = Vec::new();
        if config.show_labels {
            if let Some(label) = connection.label.as_deref().filter(|l| !l.is_empty()) {
                attrs.push(format!("label=\"{}\"", escape_dot(&truncate(label, 30))));
            }
        }
        writeln!(
            dot,
            "  \"{}\" -> \"{}\" [{}];",
            escape_dot(&connection.from_node_id),
            escape_dot(&connection.to_node_id),
            attrs.join(" ")
        )?;
    }

    writeln!(dot, "}}")
}

fn write_node(dot: &mut String, indent: &str, node: &GraphNode, config: &DotConfig) -> fmt::Result {
    let mut label = truncate(&node.data.title, 40);
    if config.show_ids {
        write!(label, "\n({})", node.data.storylet_id)?;
    }
    write!(dot, "{}\"{}\" [label=\"{}\"", indent, escape_dot(&node.id), escape_dot(&label))?;
    if config.pin_positions {
        // DOT's y axis points up
        write!(dot, " pos=\"{},{}!\"", node.position.x, -node.position.y)?;
    }
    writeln!(dot, "];")
}
