use crate::core::GraphEdge;

/// An edge waiting to reach its lower visible row
#[derive(Debug, Clone, Copy)]
struct Lane {
    target: usize,
    edge: GraphEdge,
}

/// Assigns edges to columns while rows are laid out top-down.
/// - a node takes the first lane aimed at it, else the first empty lane, else a new one
/// - its first parent continues in the node's lane; other parents take the
///   nearest empty lane to the right, appending lanes as needed
#[derive(Debug, Default)]
pub(crate) struct LaneManager {
    active: Vec<Option<Lane>>,
}

impl LaneManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_column(&mut self, row: usize) -> usize {
        if let Some(i) = self
            .active
            .iter()
            .position(|slot| slot.is_some_and(|lane| lane.target == row))
        {
            return i;
        }
        if let Some(i) = self.active.iter().position(Option::is_none) {
            return i;
        }
        self.active.push(None);
        self.active.len() - 1
    }

    /// Edges ending at `row`, removed from their lanes
    pub fn arrivals(&mut self, row: usize) -> Vec<(usize, GraphEdge)> {
        let mut ended = Vec::new();
        for (i, slot) in self.active.iter_mut().enumerate() {
            if let Some(lane) = slot.filter(|lane| lane.target == row) {
                ended.push((i, lane.edge));
                *slot = None;
            }
        }
        ended
    }

    pub fn passing(&self) -> Vec<(usize, GraphEdge)> {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|lane| (i, lane.edge)))
            .collect()
    }

    /// Start the edges leaving a node; `edges` holds (target row, edge) in parent order.
    pub fn place(&mut self, node_column: usize, edges: &[(usize, GraphEdge)]) -> Vec<(usize, GraphEdge)> {
        let mut placed = Vec::with_capacity(edges.len());
        for (i, &(target, edge)) in edges.iter().enumerate() {
            let column = if i == 0 && self.active[node_column].is_none() {
                node_column
            } else {
                self.free_lane_right_of(node_column)
            };
            self.active[column] = Some(Lane { target, edge });
            placed.push((column, edge));
        }
        placed
    }

    fn free_lane_right_of(&mut self, column: usize) -> usize {
        if let Some(offset) = self.active[column + 1..].iter().position(Option::is_none) {
            return column + 1 + offset;
        }
        self.active.push(None);
        self.active.len() - 1
    }
}
