//! Storyloom - storylet authoring backend
//!
//! Keeps interactive-fiction content (storylets, arcs, characters, clues)
//! in a local SQLite database and projects it onto an editable node graph
//! whose edges are storylet choices.
//!
//! # Layers
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`store`] | Mirrors of every collection over a [`ContentBackend`] |
//! | [`graph`] | Node/connection state, selection, viewport, layout |
//! | [`sync`] | Load graph from choices, write new connections back |
//! | [`canvas`] | Pointer and keyboard gestures on the graph |
//! | [`editor`] | Draft editing of a single storylet |
//! | [`minigame`] | Clue minigames and their coordinator |
//! | [`transfer`] | JSON export/import with rate limiting |
//!
//! # Quick Start
//!
//! ```no_run
//! use storyloom::{Config, ContentStore, Database, LoadScope, NewStorylet, StoryEditor};
//!
//! let store = ContentStore::open(Database::open().unwrap()).unwrap();
//! let mut editor = StoryEditor::new(store, Config::load());
//!
//! let a = editor.create_storylet_node(NewStorylet::titled("The docks")).unwrap();
//! let b = editor.create_storylet_node(NewStorylet::titled("The warehouse")).unwrap();
//! editor.connect(&a.id, &b.id, Some("Follow the smuggler")).unwrap();
//!
//! let report = editor.load(&LoadScope::All).unwrap();
//! println!("Nodes: {}, Connections: {}", report.nodes, report.connections);
//! ```

pub mod canvas;
pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod export;
pub mod graph;
pub mod init;
pub mod minigame;
pub mod model;
pub mod ops;
pub mod schema;
pub mod store;
pub mod sync;
pub mod transfer;

pub use canvas::{Canvas, CanvasEffect, CanvasMsg, Scene};
pub use config::Config;
pub use db::{Database, DbError, CURRENT_SCHEMA};
pub use editor::{CloseOutcome, EditorPanel};
pub use error::{Error, Result};
pub use export::{graph_to_dot, DotConfig};
pub use graph::{GraphStore, SaveReport};
pub use minigame::{MinigameConfig, MinigameCoordinator, MinigameKind, MinigameResult};
pub use model::{Character, Choice, Clue, NewStorylet, StoryArc, Storylet};
pub use ops::{AbortHandle, AbortSignal, OperationRegistry};
pub use store::{ContentBackend, ContentStore, LoadScope, MemoryBackend};
pub use sync::{EditorEvent, LinkOutcome, StoryEditor};
pub use transfer::{ExportMetadata, ExportSelection, ImportReport, Transfer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        assert!(CURRENT_SCHEMA.has_feature("storylets"));
        let config = Config::default();
        assert_eq!(config.transfer.max_operations, 5);
        let graph = GraphStore::new(config.graph);
        assert!(graph_to_dot(&graph, &DotConfig::default()).starts_with("digraph"));
    }
}
