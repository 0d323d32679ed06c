//! Visual graph editor state
//!
//! - `types`: nodes, connections, selection, viewport
//! - `layout`: grid and greedy non-overlap placement
//! - `store`: the mutable editor state and choice translation

pub mod layout;
pub mod store;
pub mod types;

pub use layout::{grid_position, place_near};
pub use store::{node_id_for, GraphStore, SaveReport};
pub use types::*;
