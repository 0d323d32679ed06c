//! Canvas interaction: pointer/wheel/key input -> graph store mutations
//!
//! Follows the message/update split: input arrives as [`CanvasMsg`] data,
//! [`Canvas::update`] applies it to the [`GraphStore`] and returns a
//! [`CanvasEffect`] for anything the caller has to do outside the graph
//! (open the editor panel, forward a new connection to the sync layer).
//!
//! Pointer coordinates are screen coordinates; the viewport maps them into
//! graph space.

use crate::graph::{Connection, GraphNode, GraphStore, Position, Selection, Viewport};
use crate::sync::EditorEvent;
use serde::Serialize;

/// Radius around a node's output anchor that starts a connect drag
const ANCHOR_RADIUS: f64 = 10.0;
/// Distance from an edge segment that still counts as a click on it
const EDGE_HIT_DISTANCE: f64 = 6.0;
/// Zoom factor per wheel notch
const WHEEL_ZOOM: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    Other,
}

/// Everything the canvas can receive
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasMsg {
    PointerDown(Position),
    PointerMove(Position),
    PointerUp(Position),
    /// Negative `delta_y` zooms in
    Wheel { delta_y: f64, at: Position },
    DoubleClick(Position),
    Key(Key),
}

/// Work the caller performs after an update
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEffect {
    None,
    OpenEditor {
        node_id: String,
        storylet_id: String,
    },
    ConnectionCreated {
        connection: Connection,
        from_storylet_id: String,
        to_storylet_id: String,
    },
}

impl CanvasEffect {
    /// The sync-layer event for this effect, if it has one
    pub fn into_event(self) -> Option<EditorEvent> {
        match self {
            CanvasEffect::ConnectionCreated {
                connection,
                from_storylet_id,
                to_storylet_id,
            } => Some(EditorEvent::ConnectionCreated {
                connection,
                from_storylet_id,
                to_storylet_id,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    /// `last` is in screen space
    Panning { last: Position },
    /// `grab` is pointer minus node origin, in graph space
    Dragging { node_id: String, grab: Position },
    Connecting,
}

/// Pointer gesture state; the graph itself lives in the store
#[derive(Debug, Clone)]
pub struct Canvas {
    gesture: Gesture,
    /// Last pointer position in graph space, drives the connect preview
    cursor: Position,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            gesture: Gesture::Idle,
            cursor: Position::default(),
        }
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.gesture, Gesture::Panning { .. })
    }

    pub fn update(&mut self, msg: CanvasMsg, graph: &mut GraphStore) -> CanvasEffect {
        match msg {
            CanvasMsg::PointerDown(screen) => self.pointer_down(screen, graph),
            CanvasMsg::PointerMove(screen) => {
                self.pointer_move(screen, graph);
                CanvasEffect::None
            }
            CanvasMsg::PointerUp(screen) => self.pointer_up(screen, graph),
            CanvasMsg::Wheel { delta_y, at } => {
                if delta_y != 0.0 {
                    let factor = if delta_y < 0.0 { WHEEL_ZOOM } else { 1.0 / WHEEL_ZOOM };
                    graph.zoom_at(factor, at);
                }
                CanvasEffect::None
            }
            CanvasMsg::DoubleClick(screen) => {
                let point = graph.viewport().screen_to_graph(screen);
                match node_at(graph, point) {
                    Some(node) => {
                        let effect = CanvasEffect::OpenEditor {
                            node_id: node.id.clone(),
                            storylet_id: node.data.storylet_id.clone(),
                        };
                        let id = node.id.clone();
                        graph.select_node(Some(&id));
                        effect
                    }
                    None => CanvasEffect::None,
                }
            }
            CanvasMsg::Key(Key::Escape) => {
                if graph.connecting().is_some() {
                    graph.cancel_connecting();
                } else {
                    graph.select_node(None);
                }
                self.gesture = Gesture::Idle;
                CanvasEffect::None
            }
            CanvasMsg::Key(Key::Delete | Key::Backspace) => {
                graph.delete_selected();
                CanvasEffect::None
            }
            CanvasMsg::Key(Key::Other) => CanvasEffect::None,
        }
    }

    fn pointer_down(&mut self, screen: Position, graph: &mut GraphStore) -> CanvasEffect {
        let point = graph.viewport().screen_to_graph(screen);
        self.cursor = point;

        // A connect started elsewhere completes on the next click
        if graph.connecting().is_some() {
            let target = node_at(graph, point).map(|n| n.id.clone());
            return match target {
                Some(target) => self.finish_connect(&target, graph),
                None => {
                    graph.cancel_connecting();
                    CanvasEffect::None
                }
            };
        }

        if let Some(id) = output_anchor_at(graph, point).map(|n| n.id.clone()) {
            graph.start_connecting(&id);
            self.gesture = Gesture::Connecting;
        } else if let Some(node) = node_at(graph, point) {
            let grab = Position::new(point.x - node.position.x, point.y - node.position.y);
            let node_id = node.id.clone();
            graph.select_node(Some(&node_id));
            self.gesture = Gesture::Dragging { node_id, grab };
        } else if let Some(id) = connection_at(graph, point).map(|c| c.id.clone()) {
            graph.select_connection(Some(&id));
        } else {
            graph.select_node(None);
            self.gesture = Gesture::Panning { last: screen };
        }
        CanvasEffect::None
    }

    fn pointer_move(&mut self, screen: Position, graph: &mut GraphStore) {
        let point = graph.viewport().screen_to_graph(screen);
        self.cursor = point;
        match &mut self.gesture {
            Gesture::Panning { last } => {
                let offset = graph.viewport().offset;
                graph.set_offset(offset.offset(screen.x - last.x, screen.y - last.y));
                *last = screen;
            }
            Gesture::Dragging { node_id, grab } => {
                graph.move_node(node_id, Position::new(point.x - grab.x, point.y - grab.y));
            }
            Gesture::Connecting | Gesture::Idle => {}
        }
    }

    fn pointer_up(&mut self, screen: Position, graph: &mut GraphStore) -> CanvasEffect {
        let point = graph.viewport().screen_to_graph(screen);
        self.cursor = point;
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        if gesture != Gesture::Connecting {
            return CanvasEffect::None;
        }
        match node_at(graph, point).map(|n| n.id.clone()) {
            Some(target) => self.finish_connect(&target, graph),
            None => {
                graph.cancel_connecting();
                CanvasEffect::None
            }
        }
    }

    fn finish_connect(&mut self, target: &str, graph: &mut GraphStore) -> CanvasEffect {
        self.gesture = Gesture::Idle;
        let Some(connection) = graph.finish_connecting(target) else {
            return CanvasEffect::None;
        };
        let storylet_of = |id: &str| graph.node(id).map(|n| n.data.storylet_id.clone());
        match (storylet_of(&connection.from_node_id), storylet_of(&connection.to_node_id)) {
            (Some(from_storylet_id), Some(to_storylet_id)) => CanvasEffect::ConnectionCreated {
                connection,
                from_storylet_id,
                to_storylet_id,
            },
            _ => CanvasEffect::None,
        }
    }

    /// Renderer-neutral description of what to draw
    pub fn scene(&self, graph: &GraphStore) -> Scene {
        let config = graph.config();
        let selection = graph.selection();

        let nodes = graph
            .nodes()
            .iter()
            .map(|n| NodeRect {
                node_id: n.id.clone(),
                title: n.data.title.clone(),
                arc_name: n.data.arc_name.clone(),
                origin: n.position,
                width: config.node_width,
                height: config.node_height,
                selected: *selection == Selection::Node(n.id.clone()),
            })
            .collect();

        let edges = graph
            .connections()
            .iter()
            .filter_map(|c| {
                let from = graph.node(&c.from_node_id)?;
                let to = graph.node(&c.to_node_id)?;
                Some(EdgeSegment {
                    connection_id: c.id.clone(),
                    from: output_anchor(graph, from),
                    to: input_anchor(graph, to),
                    label: c.label.clone(),
                    selected: *selection == Selection::Connection(c.id.clone()),
                })
            })
            .collect();

        let preview = graph
            .connecting()
            .and_then(|c| graph.node(&c.from_node_id))
            .map(|from| PreviewLine {
                from: output_anchor(graph, from),
                to: self.cursor,
                dashed: true,
            });

        Scene {
            viewport: graph.viewport(),
            nodes,
            edges,
            preview,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRect {
    pub node_id: String,
    pub title: String,
    pub arc_name: Option<String>,
    /// Top-left corner in graph space
    pub origin: Position,
    pub width: f64,
    pub height: f64,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSegment {
    pub connection_id: String,
    pub from: Position,
    pub to: Position,
    pub label: Option<String>,
    pub selected: bool,
}

/// Rubber-band line from the source anchor to the live cursor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewLine {
    pub from: Position,
    pub to: Position,
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub viewport: Viewport,
    pub nodes: Vec<NodeRect>,
    pub edges: Vec<EdgeSegment>,
    pub preview: Option<PreviewLine>,
}

// === Hit testing (graph space) ===

fn output_anchor(graph: &GraphStore, node: &GraphNode) -> Position {
    let config = graph.config();
    node.position.offset(config.node_width, config.node_height / 2.0)
}

fn input_anchor(graph: &GraphStore, node: &GraphNode) -> Position {
    node.position.offset(0.0, graph.config().node_height / 2.0)
}

/// Topmost node under `point`; later nodes draw above earlier ones
fn node_at(graph: &GraphStore, point: Position) -> Option<&GraphNode> {
    let config = graph.config();
    graph.nodes().iter().rev().find(|n| {
        point.x >= n.position.x
            && point.x <= n.position.x + config.node_width
            && point.y >= n.position.y
            && point.y <= n.position.y + config.node_height
    })
}

fn output_anchor_at(graph: &GraphStore, point: Position) -> Option<&GraphNode> {
    graph
        .nodes()
        .iter()
        .rev()
        .find(|n| distance(output_anchor(graph, n), point) <= ANCHOR_RADIUS)
}

fn connection_at(graph: &GraphStore, point: Position) -> Option<&Connection> {
    graph.connections().iter().find(|c| {
        match (graph.node(&c.from_node_id), graph.node(&c.to_node_id)) {
            (Some(from), Some(to)) => {
                distance_to_segment(point, output_anchor(graph, from), input_anchor(graph, to)) <= EDGE_HIT_DISTANCE
            }
            _ => false,
        }
    })
}

fn distance(a: Position, b: Position) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn distance_to_segment(p: Position, a: Position, b: Position) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, Position::new(a.x + t * dx, a.y + t * dy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConnectionDraft, EditorMode, NodeData, NodeDraft};

    fn graph() -> GraphStore {
        let mut graph = GraphStore::default();
        for (id, x, y) in [("s1", 100.0, 100.0), ("s2", 400.0, 100.0), ("s3", 100.0, 300.0)] {
            graph.add_node(
                NodeDraft::new(
                    Position::new(x, y),
                    NodeData {
                        storylet_id: id.to_string(),
                        title: id.to_uppercase(),
                        description: String::new(),
                        arc_name: None,
                    },
                )
                .with_id(format!("node-{}", id)),
            );
        }
        graph
    }

    #[test]
    fn test_drag_from_anchor_creates_connection() {
        let mut graph = graph();
        let mut canvas = Canvas::new();

        // s1's output anchor sits at (300, 140)
        canvas.update(CanvasMsg::PointerDown(Position::new(300.0, 140.0)), &mut graph);
        assert_eq!(graph.mode(), EditorMode::Connecting);
        canvas.update(CanvasMsg::PointerMove(Position::new(150.0, 320.0)), &mut graph);
        let effect = canvas.update(CanvasMsg::PointerUp(Position::new(150.0, 320.0)), &mut graph);

        assert!(graph.connecting().is_none());
        assert_eq!(graph.connections().len(), 1);
        match effect {
            CanvasEffect::ConnectionCreated {
                connection,
                from_storylet_id,
                to_storylet_id,
            } => {
                assert_eq!(connection.from_node_id, "node-s1");
                assert_eq!(connection.to_node_id, "node-s3");
                assert_eq!((from_storylet_id.as_str(), to_storylet_id.as_str()), ("s1", "s3"));
            }
            other => panic!("expected ConnectionCreated, got {:?}", other),
        }
    }

    #[test]
    fn test_preview_follows_cursor() {
        let mut graph = graph();
        let mut canvas = Canvas::new();
        canvas.update(CanvasMsg::PointerDown(Position::new(300.0, 140.0)), &mut graph);
        canvas.update(CanvasMsg::PointerMove(Position::new(350.0, 500.0)), &mut graph);

        let preview = canvas.scene(&graph).preview.unwrap();
        assert_eq!(preview.from, Position::new(300.0, 140.0));
        assert_eq!(preview.to, Position::new(350.0, 500.0));
        assert!(preview.dashed);
    }

    #[test]
    fn test_release_on_empty_canvas_cancels() {
        let mut graph = graph();
        let mut canvas = Canvas::new();
        canvas.update(CanvasMsg::PointerDown(Position::new(300.0, 140.0)), &mut graph);
        let effect = canvas.update(CanvasMsg::PointerUp(Position::new(900.0, 900.0)), &mut graph);

        assert_eq!(effect, CanvasEffect::None);
        assert!(graph.connecting().is_none());
        assert!(graph.connections().is_empty());
        assert!(canvas.scene(&graph).preview.is_none());
    }

    #[test]
    fn test_escape_cancels_connect() {
        let mut graph = graph();
        let mut canvas = Canvas::new();
        canvas.update(CanvasMsg::PointerDown(Position::new(300.0, 140.0)), &mut graph);
        canvas.update(CanvasMsg::Key(Key::Escape), &mut graph);
        assert!(graph.connecting().is_none());
        assert_eq!(graph.mode(), EditorMode::Select);

        // The release afterwards is a no-op
        canvas.update(CanvasMsg::PointerUp(Position::new(150.0, 320.0)), &mut graph);
        assert!(graph.connections().is_empty());
    }

    #[test]
    fn test_drag_node_moves_it() {
        let mut graph = graph();
        let mut canvas = Canvas::new();
        canvas.update(CanvasMsg::PointerDown(Position::new(120.0, 110.0)), &mut graph);
        assert_eq!(*graph.selection(), Selection::Node("node-s1".into()));
        canvas.update(CanvasMsg::PointerMove(Position::new(170.0, 160.0)), &mut graph);
        canvas.update(CanvasMsg::PointerUp(Position::new(170.0, 160.0)), &mut graph);
        assert_eq!(graph.node("node-s1").unwrap().position, Position::new(150.0, 150.0));
    }

    #[test]
    fn test_pan_on_empty_canvas() {
        let mut graph = graph();
        let mut canvas = Canvas::new();
        canvas.update(CanvasMsg::PointerDown(Position::new(900.0, 900.0)), &mut graph);
        assert!(canvas.is_panning());
        canvas.update(CanvasMsg::PointerMove(Position::new(950.0, 880.0)), &mut graph);
        canvas.update(CanvasMsg::PointerUp(Position::new(950.0, 880.0)), &mut graph);
        assert_eq!(graph.viewport().offset, Position::new(50.0, -20.0));
        assert!(!canvas.is_panning());
    }

    #[test]
    fn test_wheel_zoom_is_clamped() {
        let mut graph = graph();
        let mut canvas = Canvas::new();
        for _ in 0..100 {
            canvas.update(
                CanvasMsg::Wheel {
                    delta_y: -1.0,
                    at: Position::new(200.0, 200.0),
                },
                &mut graph,
            );
        }
        assert_eq!(graph.viewport().scale, 5.0);
    }

    #[test]
    fn test_double_click_opens_editor() {
        let mut graph = graph();
        let mut canvas = Canvas::new();
        let effect = canvas.update(CanvasMsg::DoubleClick(Position::new(450.0, 120.0)), &mut graph);
        assert_eq!(
            effect,
            CanvasEffect::OpenEditor {
                node_id: "node-s2".into(),
                storylet_id: "s2".into(),
            }
        );
        let empty = canvas.update(CanvasMsg::DoubleClick(Position::new(1000.0, 1000.0)), &mut graph);
        assert_eq!(empty, CanvasEffect::None);
    }

    #[test]
    fn test_click_edge_then_delete() {
        let mut graph = graph();
        let edge = graph.add_connection(ConnectionDraft::between("node-s1", "node-s2")).unwrap();
        let mut canvas = Canvas::new();

        // Midpoint of (300,140) -> (400,140)
        canvas.update(CanvasMsg::PointerDown(Position::new(350.0, 142.0)), &mut graph);
        assert_eq!(*graph.selection(), Selection::Connection(edge.clone()));
        canvas.update(CanvasMsg::Key(Key::Delete), &mut graph);
        assert!(graph.connection(&edge).is_none());
        assert_eq!(graph.nodes().len(), 3);
    }

    #[test]
    fn test_effect_converts_to_event() {
        let mut graph = graph();
        let mut canvas = Canvas::new();
        canvas.update(CanvasMsg::PointerDown(Position::new(300.0, 140.0)), &mut graph);
        let effect = canvas.update(CanvasMsg::PointerUp(Position::new(450.0, 120.0)), &mut graph);
        assert!(matches!(effect.into_event(), Some(EditorEvent::ConnectionCreated { .. })));
        assert!(CanvasEffect::None.into_event().is_none());
    }
}
