//! Graph editor types
//!
//! Nodes and connections are transient: they are rebuilt from content-store
//! records each time the editor loads and are never persisted themselves.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Storylet,
}

/// Content a node displays; `storylet_id` ties it to its record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub storylet_id: String,
    pub title: String,
    pub description: String,
    pub arc_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
}

/// A node to add; an id is generated when `id` is `None`
#[derive(Debug, Clone)]
pub struct NodeDraft {
    pub id: Option<String>,
    pub position: Position,
    pub data: NodeData,
}

impl NodeDraft {
    pub fn new(position: Position, data: NodeData) -> Self {
        Self { id: None, position, data }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// "Taking choice `id` in from's storylet leads to to's storylet"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub from_node_id: String,
    pub to_node_id: String,
    pub label: Option<String>,
}

impl Connection {
    pub fn touches(&self, node_id: &str) -> bool {
        self.from_node_id == node_id || self.to_node_id == node_id
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionDraft {
    pub id: Option<String>,
    pub from_node_id: String,
    pub to_node_id: String,
    pub label: Option<String>,
}

impl ConnectionDraft {
    pub fn between(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: None,
            from_node_id: from.into(),
            to_node_id: to.into(),
            label: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    #[default]
    Select,
    Connecting,
}

/// Single selection: a node or a connection, never both
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Node(String),
    Connection(String),
}

/// In-progress drag-to-connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectingState {
    pub from_node_id: String,
}

/// screen = graph * scale + offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scale: f64,
    pub offset: Position,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Position::default(),
        }
    }
}

impl Viewport {
    pub fn screen_to_graph(&self, screen: Position) -> Position {
        Position::new(
            (screen.x - self.offset.x) / self.scale,
            (screen.y - self.offset.y) / self.scale,
        )
    }

    pub fn graph_to_screen(&self, graph: Position) -> Position {
        Position::new(
            graph.x * self.scale + self.offset.x,
            graph.y * self.scale + self.offset.y,
        )
    }
}

/// Serializable view of the whole editor state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub connections: Vec<Connection>,
    pub selection: Selection,
    pub mode: EditorMode,
    pub viewport: Viewport,
    pub connecting: Option<ConnectingState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_round_trip() {
        let viewport = Viewport {
            scale: 2.0,
            offset: Position::new(40.0, -10.0),
        };
        let screen = viewport.graph_to_screen(Position::new(100.0, 50.0));
        assert_eq!(screen, Position::new(240.0, 90.0));
        assert_eq!(viewport.screen_to_graph(screen), Position::new(100.0, 50.0));
    }

    #[test]
    fn test_node_serializes_with_type_tag() {
        let node = GraphNode {
            id: "node-s1".into(),
            kind: NodeKind::Storylet,
            position: Position::new(100.0, 100.0),
            data: NodeData {
                storylet_id: "s1".into(),
                title: "Opening".into(),
                description: String::new(),
                arc_name: None,
            },
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "storylet");
        assert_eq!(json["data"]["storyletId"], "s1");
    }
}
