//! Graph editor state: nodes, connections, selection, viewport
//!
//! All mutations are synchronous and total. An id that does not resolve is
//! treated as stale UI state and the call is a no-op, because reloads can
//! race with pointer events that still reference the previous graph.

use super::layout;
use super::types::*;
use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::model::{Choice, Storylet};
use std::collections::HashMap;

/// Deterministic node id for a storylet loaded into the editor
pub fn node_id_for(storylet_id: &str) -> String {
    format!("node-{}", storylet_id)
}

/// Outcome of writing connections back as storylet choices
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SaveReport {
    /// Storylets whose choice list was written
    pub updated: Vec<String>,
    /// Storylets whose write failed, with the error text
    pub failed: Vec<(String, String)>,
    /// Connections whose endpoints no longer resolve
    pub stale: usize,
    pub aborted: bool,
}

impl SaveReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }
}

#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: Vec<GraphNode>,
    connections: Vec<Connection>,
    selection: Selection,
    mode: EditorMode,
    viewport: Viewport,
    connecting: Option<ConnectingState>,
    config: GraphConfig,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl GraphStore {
    /// Bounds in `config` are repaired first, so zooming never panics
    pub fn new(config: GraphConfig) -> Self {
        let config = config.sanitized();
        Self {
            nodes: Vec::new(),
            connections: Vec::new(),
            selection: Selection::None,
            mode: EditorMode::Select,
            viewport: Viewport::default(),
            connecting: None,
            config,
        }
    }

    // === Accessors ===

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn node_for_storylet(&self, storylet_id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.data.storylet_id == storylet_id)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_node(&self) -> Option<&GraphNode> {
        match &self.selection {
            Selection::Node(id) => self.node(id),
            _ => None,
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn connecting(&self) -> Option<&ConnectingState> {
        self.connecting.as_ref()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            connections: self.connections.clone(),
            selection: self.selection.clone(),
            mode: self.mode,
            viewport: self.viewport,
            connecting: self.connecting.clone(),
        }
    }

    // === Nodes ===

    /// Append a node. Returns its id, or `None` if the id is already taken.
    pub fn add_node(&mut self, draft: NodeDraft) -> Option<String> {
        let id = draft.id.unwrap_or_else(|| format!("node-{}", uuid::Uuid::new_v4()));
        if self.node(&id).is_some() {
            tracing::debug!(node = %id, "node already present, skipping");
            return None;
        }
        self.nodes.push(GraphNode {
            id: id.clone(),
            kind: NodeKind::Storylet,
            position: draft.position,
            data: draft.data,
        });
        Some(id)
    }

    /// Remove a node and every connection touching it
    pub fn remove_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return false;
        }

        let removed: Vec<String> = self
            .connections
            .iter()
            .filter(|c| c.touches(id))
            .map(|c| c.id.clone())
            .collect();
        self.connections.retain(|c| !c.touches(id));

        let selection_gone = match &self.selection {
            Selection::Node(sel) => sel == id,
            Selection::Connection(sel) => removed.contains(sel),
            Selection::None => false,
        };
        if selection_gone {
            self.selection = Selection::None;
        }
        if self.connecting.as_ref().is_some_and(|c| c.from_node_id == id) {
            self.cancel_connecting();
        }
        true
    }

    /// Pure position update; overlap is allowed
    pub fn move_node(&mut self, id: &str, position: Position) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Refresh the displayed title/description for a storylet's node
    pub fn refresh_node_data(&mut self, storylet: &Storylet) -> bool {
        match self.nodes.iter_mut().find(|n| n.data.storylet_id == storylet.id) {
            Some(node) => {
                node.data.title = storylet.title.clone();
                node.data.description = storylet.description.clone();
                true
            }
            None => false,
        }
    }

    // === Connections ===

    /// Add an edge. Rejected (returns `None`) when an endpoint is missing,
    /// the id is taken, or the `(from, to)` pair is already connected.
    pub fn add_connection(&mut self, draft: ConnectionDraft) -> Option<String> {
        if self.node(&draft.from_node_id).is_none() || self.node(&draft.to_node_id).is_none() {
            tracing::debug!(from = %draft.from_node_id, to = %draft.to_node_id, "connection endpoint missing");
            return None;
        }
        if self
            .connections
            .iter()
            .any(|c| c.from_node_id == draft.from_node_id && c.to_node_id == draft.to_node_id)
        {
            return None;
        }
        let id = draft.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if self.connection(&id).is_some() {
            return None;
        }
        self.connections.push(Connection {
            id: id.clone(),
            from_node_id: draft.from_node_id,
            to_node_id: draft.to_node_id,
            label: draft.label,
        });
        Some(id)
    }

    pub fn set_connection_label(&mut self, id: &str, label: Option<String>) -> bool {
        match self.connections.iter_mut().find(|c| c.id == id) {
            Some(connection) => {
                connection.label = label;
                true
            }
            None => false,
        }
    }

    pub fn remove_connection(&mut self, id: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        if self.connections.len() == before {
            return false;
        }
        if self.selection == Selection::Connection(id.to_string()) {
            self.selection = Selection::None;
        }
        true
    }

    // === Drag-to-connect ===

    pub fn start_connecting(&mut self, from_node_id: &str) -> bool {
        if self.node(from_node_id).is_none() {
            return false;
        }
        self.connecting = Some(ConnectingState {
            from_node_id: from_node_id.to_string(),
        });
        self.mode = EditorMode::Connecting;
        true
    }

    /// Complete the pending connect on `to_node_id`. Returns the new edge;
    /// dropping on the source node, a missing node or an already-connected
    /// target ends the gesture without one.
    pub fn finish_connecting(&mut self, to_node_id: &str) -> Option<Connection> {
        let pending = self.connecting.take()?;
        self.mode = EditorMode::Select;
        if pending.from_node_id == to_node_id {
            return None;
        }
        let id = self.add_connection(ConnectionDraft::between(pending.from_node_id, to_node_id))?;
        self.connection(&id).cloned()
    }

    pub fn cancel_connecting(&mut self) {
        self.connecting = None;
        self.mode = EditorMode::Select;
    }

    // === Selection ===

    /// Select a node (clears any connection selection). `None` clears.
    pub fn select_node(&mut self, id: Option<&str>) {
        self.selection = match id {
            Some(id) if self.node(id).is_some() => Selection::Node(id.to_string()),
            Some(_) => return,
            None => Selection::None,
        };
    }

    /// Select a connection (clears any node selection). `None` clears.
    pub fn select_connection(&mut self, id: Option<&str>) {
        self.selection = match id {
            Some(id) if self.connection(id).is_some() => Selection::Connection(id.to_string()),
            Some(_) => return,
            None => Selection::None,
        };
    }

    /// Delete whatever is selected
    pub fn delete_selected(&mut self) -> bool {
        match self.selection.clone() {
            Selection::Node(id) => self.remove_node(&id),
            Selection::Connection(id) => self.remove_connection(&id),
            Selection::None => false,
        }
    }

    // === Viewport ===

    /// Set the zoom factor, clamped to the configured bounds.
    /// Non-finite input is ignored.
    pub fn set_scale(&mut self, scale: f64) {
        if !scale.is_finite() {
            return;
        }
        self.viewport.scale = scale.clamp(self.config.min_scale, self.config.max_scale);
    }

    pub fn set_offset(&mut self, offset: Position) {
        if offset.x.is_finite() && offset.y.is_finite() {
            self.viewport.offset = offset;
        }
    }

    /// Multiply the scale by `factor`, keeping `screen_point` fixed
    pub fn zoom_at(&mut self, factor: f64, screen_point: Position) {
        let anchor = self.viewport.screen_to_graph(screen_point);
        self.set_scale(self.viewport.scale * factor);
        let scale = self.viewport.scale;
        self.set_offset(Position::new(
            screen_point.x - anchor.x * scale,
            screen_point.y - anchor.y * scale,
        ));
    }

    // === Layout ===

    /// Lay every node out on the grid in creation order
    pub fn auto_layout(&mut self) {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.position = layout::grid_position(index, &self.config);
        }
    }

    /// Reset to the empty initial state. Viewport config is kept.
    pub fn clear_editor(&mut self) {
        self.nodes.clear();
        self.connections.clear();
        self.selection = Selection::None;
        self.mode = EditorMode::Select;
        self.viewport = Viewport::default();
        self.connecting = None;
    }

    // === Choice <-> connection translation ===

    /// Derive edges from storylet choices. One connection per navigable
    /// choice whose source and target both have nodes, keyed by the choice
    /// id. Returns how many were added.
    pub fn create_connections_from_storylet_choices(&mut self, storylets: &[Storylet]) -> usize {
        let node_by_storylet: HashMap<String, String> = self
            .nodes
            .iter()
            .map(|n| (n.data.storylet_id.clone(), n.id.clone()))
            .collect();

        let mut added = 0;
        for storylet in storylets {
            let Some(from) = node_by_storylet.get(&storylet.id) else {
                continue;
            };
            for choice in storylet.choices.iter().filter(|c| c.is_navigable()) {
                let Some(target) = choice.next_storylet_id.as_deref() else {
                    continue;
                };
                let Some(to) = node_by_storylet.get(target) else {
                    tracing::debug!(choice = %choice.id, target, "choice target not on canvas");
                    continue;
                };
                let draft = ConnectionDraft::between(from.clone(), to.clone())
                    .with_id(choice.id.clone())
                    .labeled(choice.text.clone());
                if self.add_connection(draft).is_some() {
                    added += 1;
                }
            }
        }
        added
    }

    /// Make every connection durable as a choice on its source storylet.
    ///
    /// `update` is called once per storylet whose choice list changed; a
    /// second call with no graph changes in between calls it zero times.
    /// An `Error::Aborted` from `update` stops the pass.
    pub fn save_connections_to_storylet_choices<F>(&self, storylets: &[Storylet], mut update: F) -> SaveReport
    where
        F: FnMut(Storylet) -> Result<()>,
    {
        let by_id: HashMap<&str, &Storylet> = storylets.iter().map(|s| (s.id.as_str(), s)).collect();
        let mut pending: Vec<Storylet> = Vec::new();
        let mut report = SaveReport::default();

        for connection in &self.connections {
            let endpoints = self
                .node(&connection.from_node_id)
                .zip(self.node(&connection.to_node_id));
            let Some((from, to)) = endpoints else {
                report.stale += 1;
                continue;
            };
            let source_id = from.data.storylet_id.as_str();
            let target_id = to.data.storylet_id.as_str();
            let Some(target) = by_id.get(target_id) else {
                report.stale += 1;
                continue;
            };

            let index = match pending.iter().position(|s| s.id == source_id) {
                Some(i) => i,
                None => match by_id.get(source_id) {
                    Some(source) => {
                        pending.push((*source).clone());
                        pending.len() - 1
                    }
                    None => {
                        report.stale += 1;
                        continue;
                    }
                },
            };
            let source = &mut pending[index];

            if let Some(choice) = source.choices.iter_mut().find(|c| c.id == connection.id) {
                if choice.next_storylet_id.as_deref() != Some(target_id) {
                    choice.next_storylet_id = Some(target_id.to_string());
                }
                continue;
            }
            if source.has_choice_to(target_id) {
                continue;
            }
            let text = connection
                .label
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or("Continue");
            source
                .choices
                .push(Choice::leading_to(connection.id.clone(), text, target_id, &target.title));
        }

        for storylet in pending {
            let unchanged = by_id
                .get(storylet.id.as_str())
                .is_some_and(|original| original.choices == storylet.choices);
            if unchanged {
                continue;
            }
            let id = storylet.id.clone();
            match update(storylet) {
                Ok(()) => report.updated.push(id),
                Err(Error::Aborted(op)) => {
                    tracing::info!(operation = %op, "connection save aborted");
                    report.aborted = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(storylet = %id, error = %e, "failed to save connections");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        report
    }
}
