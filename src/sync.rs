//! Graph <-> content synchronization
//!
//! [`StoryEditor`] is the only place where graph events turn into content
//! writes. Loading projects storylets into the graph; `ConnectionCreated`
//! and `StoryletCreated` events flow the other way through a typed bus.
//! Edges derived from existing choices are added straight to the graph
//! store and never dispatched, so a load cannot write choices back.

use crate::config::Config;
use crate::editor::EditorPanel;
use crate::error::Result;
use crate::graph::{
    grid_position, node_id_for, place_near, Connection, GraphStore, NodeData, NodeDraft, Position, SaveReport,
};
use crate::model::{Choice, NewStorylet, Storylet};
use crate::ops::{AbortHandle, OperationRegistry};
use crate::store::{ContentBackend, ContentStore, LoadScope};

pub const LOAD_OPERATION: &str = "load-graph";
pub const SAVE_OPERATION: &str = "save-connections";

/// Domain events raised by the canvas and node-creation tool
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    ConnectionCreated {
        connection: Connection,
        from_storylet_id: String,
        to_storylet_id: String,
    },
    StoryletCreated {
        storylet_id: String,
        /// Node open in the editor panel when the storylet was created
        anchor_node_id: Option<String>,
    },
    /// A load placed its nodes and is about to derive connections
    NodesPlaced { count: usize },
}

type Observer = Box<dyn FnMut(&EditorEvent)>;

/// Typed in-process event bus
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Observer>,
}

impl EventBus {
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&EditorEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn publish(&mut self, event: &EditorEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub nodes: usize,
    pub connections: usize,
}

/// Result of handling a `ConnectionCreated` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new choice was appended and persisted
    Linked,
    /// The source storylet already leads to the target
    AlreadyLinked,
    /// An endpoint no longer exists
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Link(LinkOutcome),
    /// Id of the node placed for a new storylet, if one was placed
    Placed(Option<String>),
    /// Observers were notified; nothing else to do
    Observed,
}

/// Editor session: content mirror, graph projection and the glue between them
pub struct StoryEditor<B: ContentBackend> {
    content: ContentStore<B>,
    graph: GraphStore,
    bus: EventBus,
    ops: OperationRegistry,
    config: Config,
    open_node: Option<String>,
}

impl<B: ContentBackend> StoryEditor<B> {
    pub fn new(content: ContentStore<B>, config: Config) -> Self {
        let config = config.sanitized();
        Self {
            content,
            graph: GraphStore::new(config.graph.clone()),
            bus: EventBus::default(),
            ops: OperationRegistry::new(),
            config,
            open_node: None,
        }
    }

    pub fn content(&self) -> &ContentStore<B> {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut ContentStore<B> {
        &mut self.content
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut GraphStore {
        &mut self.graph
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.ops
    }

    /// Handle for aborting `LOAD_OPERATION` or `SAVE_OPERATION` from a store
    /// listener or bus observer while the operation runs
    pub fn abort_handle(&self) -> AbortHandle {
        self.ops.handle()
    }

    /// Node whose storylet is open in the editor panel
    pub fn open_node(&self) -> Option<&str> {
        self.open_node.as_deref()
    }

    pub fn set_open_node(&mut self, node_id: Option<String>) {
        self.open_node = node_id;
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&EditorEvent) + 'static,
    {
        self.bus.subscribe(observer);
    }

    // === Load direction ===

    /// Rebuild the graph from the content store
    ///
    /// Reset-then-rebuild: the graph is cleared, every in-scope storylet gets
    /// a grid node, and only then are connections derived from choices.
    pub fn load(&mut self, scope: &LoadScope) -> Result<LoadReport> {
        let signal = self.ops.begin(LOAD_OPERATION);
        let storylets = self.content.storylets_for(scope);

        self.graph.clear_editor();
        self.open_node = None;
        for (index, storylet) in storylets.iter().enumerate() {
            let position = grid_position(index, self.graph.config());
            let draft = NodeDraft::new(position, self.node_data(storylet)).with_id(node_id_for(&storylet.id));
            self.graph.add_node(draft);
        }
        self.bus.publish(&EditorEvent::NodesPlaced {
            count: self.graph.nodes().len(),
        });

        if let Err(e) = signal.checkpoint() {
            tracing::info!(nodes = storylets.len(), "graph load superseded before connections");
            return Err(e);
        }

        let connections = self.graph.create_connections_from_storylet_choices(&storylets);
        self.ops.finish(LOAD_OPERATION, &signal);

        let report = LoadReport {
            nodes: self.graph.nodes().len(),
            connections,
        };
        tracing::debug!(?scope, nodes = report.nodes, connections = report.connections, "graph loaded");
        Ok(report)
    }

    fn node_data(&self, storylet: &Storylet) -> NodeData {
        NodeData {
            storylet_id: storylet.id.clone(),
            title: storylet.title.clone(),
            description: storylet.description.clone(),
            arc_name: storylet
                .arc_id
                .as_deref()
                .and_then(|id| self.content.arc(id))
                .map(|arc| arc.name.clone()),
        }
    }

    // === Edit direction ===

    /// Publish an event to observers, then handle it
    pub fn dispatch(&mut self, event: EditorEvent) -> Result<DispatchOutcome> {
        self.bus.publish(&event);
        match event {
            EditorEvent::ConnectionCreated {
                connection,
                from_storylet_id,
                to_storylet_id,
            } => self
                .handle_connection_created(&connection, &from_storylet_id, &to_storylet_id)
                .map(DispatchOutcome::Link),
            EditorEvent::StoryletCreated {
                storylet_id,
                anchor_node_id,
            } => Ok(DispatchOutcome::Placed(
                self.handle_storylet_created(&storylet_id, anchor_node_id.as_deref()),
            )),
            EditorEvent::NodesPlaced { .. } => Ok(DispatchOutcome::Observed),
        }
    }

    /// Persist a freshly drawn edge as a choice on its source storylet
    ///
    /// On a persistence failure the edge stays in the graph; a later
    /// `save_connections` retries it.
    pub fn handle_connection_created(
        &mut self,
        connection: &Connection,
        from_storylet_id: &str,
        to_storylet_id: &str,
    ) -> Result<LinkOutcome> {
        let (Some(source), Some(target)) = (
            self.content.storylet(from_storylet_id),
            self.content.storylet(to_storylet_id),
        ) else {
            tracing::debug!(from = from_storylet_id, to = to_storylet_id, "connection endpoint gone, skipping");
            return Ok(LinkOutcome::Stale);
        };

        if source.has_choice_to(to_storylet_id) || source.choice(&connection.id).is_some() {
            return Ok(LinkOutcome::AlreadyLinked);
        }

        let text = connection
            .label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or("Continue");
        let choice = Choice::leading_to(connection.id.clone(), text, to_storylet_id, &target.title);
        let mut updated = source.clone();
        updated.choices.push(choice);

        match self.content.update_storylet(updated) {
            Ok(_) => {
                tracing::debug!(from = from_storylet_id, to = to_storylet_id, "choice added for new connection");
                Ok(LinkOutcome::Linked)
            }
            Err(e) => {
                tracing::error!(storylet = from_storylet_id, error = %e, "failed to persist connection");
                Err(e)
            }
        }
    }

    /// Place a node for a storylet that was just created
    pub fn handle_storylet_created(&mut self, storylet_id: &str, anchor_node_id: Option<&str>) -> Option<String> {
        if let Some(existing) = self.graph.node_for_storylet(storylet_id) {
            return Some(existing.id.clone());
        }
        let Some(storylet) = self.content.storylet(storylet_id).cloned() else {
            tracing::debug!(storylet = storylet_id, "created storylet not in store, skipping");
            return None;
        };

        let anchor = anchor_node_id.and_then(|id| self.graph.node(id)).map(|n| n.position);
        let graph_config = self.graph.config();
        let origin = Position::new(graph_config.origin_x, graph_config.origin_y);
        let position = place_near(anchor, origin, self.graph.nodes(), &self.config.placement);

        let draft = NodeDraft::new(position, self.node_data(&storylet)).with_id(node_id_for(&storylet.id));
        self.graph.add_node(draft)
    }

    /// Create the content record, then its node next to the open one
    pub fn create_storylet_node(&mut self, draft: NewStorylet) -> Result<Storylet> {
        let storylet = self.content.create_storylet(draft)?;
        self.dispatch(EditorEvent::StoryletCreated {
            storylet_id: storylet.id.clone(),
            anchor_node_id: self.open_node.clone(),
        })?;
        Ok(storylet)
    }

    /// Drag-to-connect between two storylets' nodes, then raise the event
    pub fn connect(&mut self, from_storylet_id: &str, to_storylet_id: &str, label: Option<&str>) -> Result<LinkOutcome> {
        let endpoints = self
            .graph
            .node_for_storylet(from_storylet_id)
            .map(|n| n.id.clone())
            .zip(self.graph.node_for_storylet(to_storylet_id).map(|n| n.id.clone()));
        let Some((from_node, to_node)) = endpoints else {
            tracing::debug!(from = from_storylet_id, to = to_storylet_id, "storylet not on canvas");
            return Ok(LinkOutcome::Stale);
        };

        self.graph.start_connecting(&from_node);
        let Some(mut connection) = self.graph.finish_connecting(&to_node) else {
            return Ok(LinkOutcome::AlreadyLinked);
        };
        if let Some(label) = label {
            self.graph.set_connection_label(&connection.id, Some(label.to_string()));
            connection.label = Some(label.to_string());
        }

        match self.dispatch(EditorEvent::ConnectionCreated {
            connection,
            from_storylet_id: from_storylet_id.to_string(),
            to_storylet_id: to_storylet_id.to_string(),
        })? {
            DispatchOutcome::Link(outcome) => Ok(outcome),
            DispatchOutcome::Placed(_) | DispatchOutcome::Observed => Ok(LinkOutcome::Stale),
        }
    }

    /// Write every graph connection back as a storylet choice
    pub fn save_connections(&mut self) -> Result<SaveReport> {
        let signal = self.ops.begin(SAVE_OPERATION);
        let storylets = self.content.storylets().to_vec();
        let content = &mut self.content;

        let report = self.graph.save_connections_to_storylet_choices(&storylets, |storylet| {
            signal.checkpoint()?;
            content.update_storylet(storylet).map(|_| ())
        });
        self.ops.finish(SAVE_OPERATION, &signal);

        tracing::info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            aborted = report.aborted,
            "connections saved"
        );
        Ok(report)
    }

    /// Save an editor panel and refresh the node it was opened from
    pub fn save_panel(&mut self, panel: &mut EditorPanel) -> Result<Storylet> {
        let saved = panel.save(&mut self.content)?;
        self.graph.refresh_node_data(&saved);
        Ok(saved)
    }

    /// Abort in-flight operations and drop the graph
    pub fn shutdown(&mut self) {
        self.ops.abort_all();
        self.graph.clear_editor();
        self.open_node = None;
    }
}
