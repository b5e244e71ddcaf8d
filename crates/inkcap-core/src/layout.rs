use crate::graph::LinkGraph;
use crate::interaction::Camera;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const CENTER_PULL: f32 = 0.0005;
pub const REPEL_RADIUS: f32 = 200.0;
pub const REPEL_STRENGTH: f32 = 1.2;
pub const SPRING_REST: f32 = 120.0;
pub const SPRING_STIFFNESS: f32 = 0.005;
pub const DAMPING: f32 = 0.85;
pub const HOT_WINDOW_MILLIS: i64 = 24 * 60 * 60 * 1000;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Clone, Debug, PartialEq)]
pub struct SimNode {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

// Owns all node position/velocity state. Interaction code never mutates
// nodes directly; it goes through the begin_drag/drag_to/end_drag channel.
pub struct ForceLayout {
    nodes: Vec<SimNode>,
    edges: Vec<(usize, usize)>,
    dragged: Option<usize>,
    viewport: (f32, f32),
    ticker: Ticker,
}

impl ForceLayout {
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            dragged: None,
            viewport: (viewport_width, viewport_height),
            ticker: Ticker::new(FRAME_INTERVAL),
        }
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = (width, height);
    }

    // Adopts a rebuilt graph. Nodes already simulated keep their exact
    // position and velocity; only new nodes take the builder's seeded spot.
    pub fn sync(&mut self, graph: &LinkGraph) {
        let dragged_id = self.dragged.map(|ix| self.nodes[ix].id.clone());
        let existing: HashMap<String, (f32, f32, f32, f32)> = self
            .nodes
            .drain(..)
            .map(|node| (node.id.clone(), (node.x, node.y, node.vx, node.vy)))
            .collect();

        self.nodes = graph
            .nodes
            .iter()
            .map(|node| {
                let (x, y, vx, vy) = existing
                    .get(&node.id)
                    .copied()
                    .unwrap_or((node.x, node.y, node.vx, node.vy));
                SimNode {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    x,
                    y,
                    vx,
                    vy,
                }
            })
            .collect();

        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(ix, node)| (node.id.as_str(), ix))
            .collect();
        self.edges = graph
            .edges
            .iter()
            .filter_map(|edge| {
                Some((
                    *index.get(edge.source.as_str())?,
                    *index.get(edge.target.as_str())?,
                ))
            })
            .collect();
        self.dragged =
            dragged_id.and_then(|id| self.nodes.iter().position(|node| node.id == id));
    }

    pub fn start(&mut self, now: Instant) {
        self.ticker.start(now);
    }

    pub fn stop(&mut self) {
        self.ticker.stop();
    }

    pub fn running(&self) -> bool {
        self.ticker.running()
    }

    // Runs one integration step if the frame clock says one is due.
    pub fn advance(&mut self, now: Instant, camera: &Camera) -> bool {
        if !self.ticker.due(now) {
            return false;
        }
        self.step(camera);
        true
    }

    pub fn step(&mut self, camera: &Camera) {
        let count = self.nodes.len();
        let positions: Vec<(f32, f32)> = self.nodes.iter().map(|node| (node.x, node.y)).collect();
        let (view_w, view_h) = self.viewport;
        let (center_x, center_y) = camera.screen_to_world(view_w / 2.0, view_h / 2.0);

        // Centering pull and pairwise repulsion inside the cutoff.
        for i in 0..count {
            if self.dragged == Some(i) {
                continue;
            }
            let (xi, yi) = positions[i];
            let mut vx = (center_x - xi) * CENTER_PULL;
            let mut vy = (center_y - yi) * CENTER_PULL;
            for (j, &(xj, yj)) in positions.iter().enumerate() {
                if i == j {
                    continue;
                }
                let dx = xj - xi;
                let dy = yj - yi;
                let dist = (dx * dx + dy * dy).sqrt().max(1.0);
                if dist < REPEL_RADIUS {
                    vx -= (dx / dist) * (REPEL_STRENGTH / dist);
                    vy -= (dy / dist) * (REPEL_STRENGTH / dist);
                }
            }
            self.nodes[i].vx += vx;
            self.nodes[i].vy += vy;
        }

        // Hooke springs along edges, toward the rest length.
        for &(source, target) in &self.edges {
            let (sx, sy) = positions[source];
            let (tx, ty) = positions[target];
            let dx = tx - sx;
            let dy = ty - sy;
            let dist = (dx * dx + dy * dy).sqrt().max(1.0);
            let force = (dist - SPRING_REST) * SPRING_STIFFNESS;
            if self.dragged != Some(source) {
                self.nodes[source].vx += (dx / dist) * force;
                self.nodes[source].vy += (dy / dist) * force;
            }
            if self.dragged != Some(target) {
                self.nodes[target].vx -= (dx / dist) * force;
                self.nodes[target].vy -= (dy / dist) * force;
            }
        }

        // Integrate and damp. The dragged node is pinned elsewhere.
        for (ix, node) in self.nodes.iter_mut().enumerate() {
            if self.dragged == Some(ix) {
                continue;
            }
            node.x += node.vx;
            node.y += node.vy;
            node.vx *= DAMPING;
            node.vy *= DAMPING;
        }
    }

    // Nearest node within the pick radius, in world coordinates.
    pub fn pick(&self, wx: f32, wy: f32, radius: f32) -> Option<&SimNode> {
        self.nodes
            .iter()
            .map(|node| {
                let dx = node.x - wx;
                let dy = node.y - wy;
                (node, (dx * dx + dy * dy).sqrt())
            })
            .filter(|(_, dist)| *dist < radius)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(node, _)| node)
    }

    pub fn begin_drag(&mut self, id: &str) -> bool {
        self.dragged = self.nodes.iter().position(|node| node.id == id);
        self.dragged.is_some()
    }

    pub fn drag_to(&mut self, wx: f32, wy: f32) {
        if let Some(ix) = self.dragged {
            let node = &mut self.nodes[ix];
            node.x = wx;
            node.y = wy;
            node.vx = 0.0;
            node.vy = 0.0;
        }
    }

    pub fn end_drag(&mut self) -> Option<String> {
        self.dragged
            .take()
            .map(|ix| self.nodes[ix].id.clone())
    }

    pub fn dragged_id(&self) -> Option<&str> {
        self.dragged.map(|ix| self.nodes[ix].id.as_str())
    }
}

// Passive frame clock. The host loop calls due() as often as it likes; one
// step fires per elapsed interval, and stop() is the whole teardown story.
pub struct Ticker {
    interval: Duration,
    running: bool,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: false,
            next_due: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.next_due = Some(now);
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.next_due = None;
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn due(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        match self.next_due {
            Some(at) if now >= at => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeStyle {
    pub radius: f32,
    pub glow: f32,
    pub hot: bool,
}

// Render-only decoration: recently edited notes draw bigger, glow, and
// pulse. Never feeds back into the simulation.
pub fn node_style(updated_at: i64, now: i64, elapsed_millis: f32, active: bool) -> NodeStyle {
    let hot = now.saturating_sub(updated_at) < HOT_WINDOW_MILLIS;
    let pulse = if hot {
        (elapsed_millis / 200.0).sin() * 2.0
    } else {
        0.0
    };
    let base = if active {
        8.0
    } else if hot {
        6.0
    } else {
        4.0
    };
    NodeStyle {
        radius: base + pulse,
        glow: if active {
            15.0
        } else if hot {
            8.0
        } else {
            0.0
        },
        hot,
    }
}

#[cfg(test)]
mod tests {
    use super::{node_style, ForceLayout, Ticker, DAMPING, HOT_WINDOW_MILLIS, SPRING_REST};
    use crate::graph::{GraphEdge, GraphNode, LinkGraph};
    use crate::interaction::Camera;
    use std::time::{Duration, Instant};

    fn graph_node(id: &str, x: f32, y: f32) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            name: id.to_string(),
            x,
            y,
            vx: 0.0,
            vy: 0.0,
        }
    }

    fn edge(source: &str, target: &str) -> GraphEdge {
        GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn sync_preserves_position_and_velocity_of_known_nodes() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("a", 10.0, 20.0), graph_node("b", 30.0, 40.0)],
            edges: vec![edge("a", "b")],
        });
        layout.step(&Camera::default());
        let before: Vec<(f32, f32, f32, f32)> = layout
            .nodes()
            .iter()
            .map(|node| (node.x, node.y, node.vx, node.vy))
            .collect();

        // Rebuild with one extra node; the survivors must be bit-identical.
        layout.sync(&LinkGraph {
            nodes: vec![
                graph_node("a", 500.0, 500.0),
                graph_node("b", 500.0, 500.0),
                graph_node("c", 77.0, 88.0),
            ],
            edges: vec![edge("a", "b")],
        });
        let after: Vec<(f32, f32, f32, f32)> = layout
            .nodes()
            .iter()
            .take(2)
            .map(|node| (node.x, node.y, node.vx, node.vy))
            .collect();
        assert_eq!(before, after);

        let fresh = &layout.nodes()[2];
        assert_eq!((fresh.x, fresh.y), (77.0, 88.0));
        assert_eq!((fresh.vx, fresh.vy), (0.0, 0.0));
    }

    #[test]
    fn spring_pulls_overlong_edge_together() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        layout.sync(&LinkGraph {
            nodes: vec![
                graph_node("a", 0.0, 300.0),
                graph_node("b", SPRING_REST * 4.0, 300.0),
            ],
            edges: vec![edge("a", "b")],
        });
        let gap_before = layout.nodes()[1].x - layout.nodes()[0].x;
        for _ in 0..10 {
            layout.step(&Camera::default());
        }
        let gap_after = layout.nodes()[1].x - layout.nodes()[0].x;
        assert!(gap_after < gap_before);
    }

    #[test]
    fn repulsion_pushes_close_nodes_apart() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        // Two unlinked nodes near the viewport center, slightly separated.
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("a", 395.0, 300.0), graph_node("b", 405.0, 300.0)],
            edges: vec![],
        });
        let gap_before = layout.nodes()[1].x - layout.nodes()[0].x;
        layout.step(&Camera::default());
        let gap_after = layout.nodes()[1].x - layout.nodes()[0].x;
        assert!(gap_after > gap_before);
    }

    #[test]
    fn centering_force_pulls_toward_viewport_center() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("a", 0.0, 0.0)],
            edges: vec![],
        });
        for _ in 0..50 {
            layout.step(&Camera::default());
        }
        let node = &layout.nodes()[0];
        let dist_before = (400.0f32.powi(2) + 300.0f32.powi(2)).sqrt();
        let dist_after =
            ((node.x - 400.0).powi(2) + (node.y - 300.0).powi(2)).sqrt();
        assert!(dist_after < dist_before);
    }

    #[test]
    fn velocity_decays_by_damping_each_step() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        // A node at the exact viewport center receives no net force, so the
        // seeded velocity is the only thing moving it.
        let mut seeded = graph_node("a", 400.0, 300.0);
        seeded.vx = 10.0;
        layout.sync(&LinkGraph {
            nodes: vec![seeded],
            edges: vec![],
        });
        layout.step(&Camera::default());
        let node = &layout.nodes()[0];
        assert_eq!(node.x, 410.0);
        assert_eq!(node.vx, 10.0 * DAMPING);
    }

    #[test]
    fn dragged_node_is_pinned_and_excluded_from_forces() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("a", 100.0, 100.0), graph_node("b", 120.0, 100.0)],
            edges: vec![edge("a", "b")],
        });
        assert!(layout.begin_drag("a"));
        layout.drag_to(50.0, 60.0);
        layout.step(&Camera::default());

        let held = &layout.nodes()[0];
        assert_eq!((held.x, held.y), (50.0, 60.0));
        assert_eq!((held.vx, held.vy), (0.0, 0.0));

        assert_eq!(layout.end_drag().as_deref(), Some("a"));
        assert_eq!(layout.dragged_id(), None);
    }

    #[test]
    fn drag_survives_graph_rebuild() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("a", 100.0, 100.0)],
            edges: vec![],
        });
        layout.begin_drag("a");
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("b", 0.0, 0.0), graph_node("a", 9.0, 9.0)],
            edges: vec![],
        });
        assert_eq!(layout.dragged_id(), Some("a"));

        // The held node disappearing ends the drag.
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("b", 0.0, 0.0)],
            edges: vec![],
        });
        assert_eq!(layout.dragged_id(), None);
    }

    #[test]
    fn pick_returns_nearest_node_within_radius() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("near", 100.0, 100.0), graph_node("far", 112.0, 100.0)],
            edges: vec![],
        });
        let hit = layout.pick(103.0, 100.0, 20.0).expect("hit");
        assert_eq!(hit.id, "near");
        assert!(layout.pick(400.0, 400.0, 20.0).is_none());
    }

    #[test]
    fn ticker_fires_per_interval_and_stops_cleanly() {
        let mut ticker = Ticker::new(Duration::from_millis(16));
        let start = Instant::now();
        assert!(!ticker.due(start));

        ticker.start(start);
        assert!(ticker.due(start));
        assert!(!ticker.due(start));
        assert!(ticker.due(start + Duration::from_millis(16)));

        ticker.stop();
        assert!(!ticker.running());
        assert!(!ticker.due(start + Duration::from_secs(5)));
    }

    #[test]
    fn advance_steps_only_while_running() {
        let mut layout = ForceLayout::new(800.0, 600.0);
        layout.sync(&LinkGraph {
            nodes: vec![graph_node("a", 0.0, 0.0)],
            edges: vec![],
        });
        let now = Instant::now();
        assert!(!layout.advance(now, &Camera::default()));

        layout.start(now);
        assert!(layout.advance(now, &Camera::default()));
        layout.stop();
        assert!(!layout.advance(now + Duration::from_secs(1), &Camera::default()));
    }

    #[test]
    fn node_style_marks_recent_notes_hot() {
        let now = 1_000_000_000;
        let fresh = node_style(now - 1000, now, 0.0, false);
        assert!(fresh.hot);
        assert_eq!(fresh.glow, 8.0);

        let stale = node_style(now - HOT_WINDOW_MILLIS - 1, now, 0.0, false);
        assert!(!stale.hot);
        assert_eq!(stale.radius, 4.0);
        assert_eq!(stale.glow, 0.0);

        let active = node_style(now - HOT_WINDOW_MILLIS - 1, now, 0.0, true);
        assert_eq!(active.glow, 15.0);
        assert_eq!(active.radius, 8.0);
    }
}
