//! Node placement (pure functions)
//!
//! Two strategies: a fixed grid for bulk loads and auto-layout, and a greedy
//! scan for nodes created one at a time next to an existing node.

use super::types::{GraphNode, Position};
use crate::config::{GraphConfig, PlacementConfig};

/// Grid cell for the `index`-th node, wrapping every `grid_columns`
pub fn grid_position(index: usize, config: &GraphConfig) -> Position {
    let columns = config.grid_columns.max(1);
    let col = index % columns;
    let row = index / columns;
    Position::new(
        config.origin_x + col as f64 * config.column_spacing,
        config.origin_y + row as f64 * config.row_spacing,
    )
}

/// Does any node sit inside the clearance box around `candidate`?
pub fn collides(candidate: Position, nodes: &[GraphNode], config: &PlacementConfig) -> bool {
    nodes.iter().any(|n| {
        (n.position.x - candidate.x).abs() < config.clearance_width
            && (n.position.y - candidate.y).abs() < config.clearance_height
    })
}

/// First free spot near `anchor`
///
/// Starts at anchor + (offset_x, offset_y), or at `origin` without an anchor,
/// and steps right by `step_x`. A candidate past `wrap_x` returns to the
/// starting column one `step_y` lower. After `max_attempts` the last
/// candidate is returned even if it overlaps.
pub fn place_near(
    anchor: Option<Position>,
    origin: Position,
    nodes: &[GraphNode],
    config: &PlacementConfig,
) -> Position {
    let start = match anchor {
        Some(a) => a.offset(config.offset_x, config.offset_y),
        None => origin,
    };

    let mut candidate = start;
    for _ in 0..config.max_attempts.max(1) {
        if !collides(candidate, nodes, config) {
            return candidate;
        }
        candidate.x += config.step_x;
        if candidate.x > config.wrap_x {
            candidate.x = start.x;
            candidate.y += config.step_y;
        }
    }

    tracing::warn!(
        x = candidate.x,
        y = candidate.y,
        attempts = config.max_attempts,
        "no free position found, placing over an existing node"
    );
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{NodeData, NodeKind};

    fn node_at(id: &str, x: f64, y: f64) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            kind: NodeKind::Storylet,
            position: Position::new(x, y),
            data: NodeData {
                storylet_id: id.to_string(),
                title: id.to_string(),
                description: String::new(),
                arc_name: None,
            },
        }
    }

    #[test]
    fn test_grid_wraps_every_n_columns() {
        let config = GraphConfig::default();
        assert_eq!(grid_position(0, &config), Position::new(100.0, 100.0));
        assert_eq!(grid_position(3, &config), Position::new(1000.0, 100.0));
        assert_eq!(grid_position(4, &config), Position::new(100.0, 300.0));
        assert_eq!(grid_position(9, &config), Position::new(400.0, 500.0));
    }

    #[test]
    fn test_place_near_uses_offset_when_free() {
        let config = PlacementConfig::default();
        let nodes = vec![node_at("a", 100.0, 100.0)];
        let placed = place_near(Some(Position::new(100.0, 100.0)), Position::default(), &nodes, &config);
        assert_eq!(placed, Position::new(400.0, 150.0));
    }

    #[test]
    fn test_place_near_nudges_right_past_collision() {
        let config = PlacementConfig::default();
        let nodes = vec![node_at("a", 100.0, 100.0), node_at("b", 400.0, 150.0)];
        let placed = place_near(Some(Position::new(100.0, 100.0)), Position::default(), &nodes, &config);
        assert_eq!(placed, Position::new(650.0, 150.0));
        assert!(!collides(placed, &nodes, &config));
    }

    #[test]
    fn test_place_near_wraps_down_at_boundary() {
        let config = PlacementConfig::default();
        // Anchor near the wrap boundary: every candidate on the first row is past it
        let nodes = vec![node_at("a", 900.0, 100.0), node_at("b", 1200.0, 150.0)];
        let placed = place_near(Some(Position::new(900.0, 100.0)), Position::default(), &nodes, &config);
        assert_eq!(placed.x, 1200.0);
        assert!(placed.y >= 250.0);
        assert!(!collides(placed, &nodes, &config));
    }

    #[test]
    fn test_fifty_nodes_from_one_anchor_never_overlap() {
        let config = PlacementConfig::default();
        let anchor = Position::new(100.0, 100.0);
        let mut nodes = vec![node_at("anchor", anchor.x, anchor.y)];

        for i in 0..50 {
            let placed = place_near(Some(anchor), Position::default(), &nodes, &config);
            assert!(!collides(placed, &nodes, &config), "node {} overlaps", i);
            nodes.push(node_at(&format!("n{}", i), placed.x, placed.y));
        }
        assert_eq!(nodes.len(), 51);
    }

    #[test]
    fn test_place_near_gives_up_after_max_attempts() {
        let config = PlacementConfig {
            max_attempts: 3,
            ..PlacementConfig::default()
        };
        let nodes: Vec<GraphNode> = (0..10)
            .map(|i| node_at(&format!("n{}", i), 400.0 + i as f64 * 50.0, 150.0))
            .collect();
        let placed = place_near(Some(Position::new(100.0, 100.0)), Position::default(), &nodes, &config);
        assert!(collides(placed, &nodes, &config));
    }
}
