//! Maps the permanent graph plus fragment visibility to printable rows.

mod lanes;
mod select;
mod text;

pub use select::SelectController;
pub use text::{chars, TextPrinter};

use crate::core::{GraphEdge, GraphElement};
use crate::fragment::{FragmentManager, UpdateRequest};
use crate::permanent::PermanentGraph;
use lanes::LaneManager;
use std::ops::Range;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintElementKind {
    Node { column: usize },
    /// Edge leaving the row's node at `from` into lane `to`
    EdgeStart { from: usize, to: usize },
    EdgePass { column: usize },
    /// Edge arriving from lane `from` at the row's node in column `to`
    EdgeEnd { from: usize, to: usize },
}

impl PrintElementKind {
    /// Lane the element occupies
    pub fn column(&self) -> usize {
        match *self {
            PrintElementKind::Node { column } | PrintElementKind::EdgePass { column } => column,
            PrintElementKind::EdgeStart { to, .. } => to,
            PrintElementKind::EdgeEnd { from, .. } => from,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintElement {
    pub kind: PrintElementKind,
    pub element: GraphElement,
    pub selected: bool,
}

/// Everything a renderer needs to paint one visible row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphPrintCell {
    /// Visible row
    pub row: usize,
    pub permanent_row: usize,
    pub node_column: usize,
    /// The end-of-loaded-history row
    pub not_loaded: bool,
    pub elements: Vec<PrintElement>,
}

impl GraphPrintCell {
    pub fn width(&self) -> usize {
        self.elements
            .iter()
            .map(|e| e.kind.column())
            .chain([self.node_column])
            .max()
            .map_or(0, |c| c + 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrintModel {
    visible: Vec<usize>,
    visible_of: Vec<Option<usize>>,
    cells: Vec<GraphPrintCell>,
    long_edges_hidden: bool,
    select: SelectController,
}

impl PrintModel {
    pub fn build(graph: &PermanentGraph, fragments: &FragmentManager, long_edges_hidden: bool) -> Self {
        let mut model = Self {
            long_edges_hidden,
            ..Self::default()
        };
        model.refresh(graph, fragments);
        model
    }

    /// Recompute visible rows and cells; selection is kept.
    pub fn refresh(&mut self, graph: &PermanentGraph, fragments: &FragmentManager) {
        let hidden = fragments.hidden_rows(graph);
        self.visible = (0..graph.row_count()).filter(|&r| !hidden[r]).collect();
        self.visible_of = vec![None; graph.row_count()];
        for (v, &p) in self.visible.iter().enumerate() {
            self.visible_of[p] = Some(v);
        }

        let mut lanes = LaneManager::new();
        self.cells = Vec::with_capacity(self.visible.len());
        for (v, &p) in self.visible.iter().enumerate() {
            let node_column = lanes.node_column(v);
            let mut elements = Vec::new();
            let arrived = lanes.arrivals(v);
            for (column, edge) in lanes.passing() {
                elements.push(edge_element(PrintElementKind::EdgePass { column }, edge));
            }
            for (from, edge) in arrived {
                elements.push(edge_element(
                    PrintElementKind::EdgeEnd { from, to: node_column },
                    edge,
                ));
            }
            elements.push(PrintElement {
                kind: PrintElementKind::Node { column: node_column },
                element: GraphElement::Node(p),
                selected: false,
            });

            let outgoing = self.outgoing(graph, &hidden, p);
            for (to, edge) in lanes.place(node_column, &outgoing) {
                elements.push(edge_element(
                    PrintElementKind::EdgeStart { from: node_column, to },
                    edge,
                ));
            }

            self.cells.push(GraphPrintCell {
                row: v,
                permanent_row: p,
                node_column,
                not_loaded: !graph.is_commit_row(p),
                elements,
            });
        }
        debug!(
            visible = self.visible.len(),
            total = graph.row_count(),
            "print model refreshed"
        );
    }

    /// Visible down-edges of permanent row `p` as (target visible row, edge).
    fn outgoing(&self, graph: &PermanentGraph, hidden: &[bool], p: usize) -> Vec<(usize, GraphEdge)> {
        let mut out = Vec::new();
        for edge in graph.down_edges(p) {
            if !hidden[edge.down] {
                if let Some(target) = self.visible_of[edge.down] {
                    out.push((target, edge));
                }
                continue;
            }
            if self.long_edges_hidden {
                continue;
            }
            // Hidden rows are interior, so each has exactly one parent.
            let mut lower = edge.down;
            while hidden[lower] {
                lower = graph.down_rows(lower)[0];
            }
            if let Some(target) = self.visible_of[lower] {
                out.push((target, GraphEdge::long(p, lower, edge.down)));
            }
        }
        out
    }

    pub fn visible_row_count(&self) -> usize {
        self.visible.len()
    }

    pub fn visible_rows(&self) -> &[usize] {
        &self.visible
    }

    pub fn permanent_row(&self, visible: usize) -> Option<usize> {
        self.visible.get(visible).copied()
    }

    pub fn visible_row(&self, permanent: usize) -> Option<usize> {
        self.visible_of.get(permanent).copied().flatten()
    }

    /// Visible rows to repaint. A partial update covers everything from the
    /// first affected row down, since a collapse shifts the rows below it.
    pub fn visible_range(&self, request: &UpdateRequest) -> Option<Range<usize>> {
        match *request {
            UpdateRequest::Nothing => None,
            UpdateRequest::All => Some(0..self.visible.len()),
            UpdateRequest::Rows { from, .. } => {
                let start = self.visible.partition_point(|&p| p < from);
                Some(start..self.visible.len())
            }
        }
    }

    pub fn get_graph_print_cell(&self, row: usize) -> Option<GraphPrintCell> {
        let mut cell = self.cells.get(row)?.clone();
        for element in &mut cell.elements {
            element.selected = self.select.is_selected(&element.element);
        }
        Some(cell)
    }

    /// Element drawn in `column` of visible `row`; the node wins over edges.
    pub fn element_at(&self, row: usize, column: usize) -> Option<GraphElement> {
        let cell = self.cells.get(row)?;
        if cell.node_column == column {
            return Some(GraphElement::Node(cell.permanent_row));
        }
        cell.elements
            .iter()
            .find(|e| e.kind.column() == column)
            .map(|e| e.element)
    }

    pub fn set_long_edge_visibility(
        &mut self,
        graph: &PermanentGraph,
        fragments: &FragmentManager,
        visible: bool,
    ) {
        if self.long_edges_hidden == !visible {
            return;
        }
        self.long_edges_hidden = !visible;
        self.refresh(graph, fragments);
    }

    pub fn are_long_edges_hidden(&self) -> bool {
        self.long_edges_hidden
    }

    pub fn select_controller(&self) -> &SelectController {
        &self.select
    }

    pub fn select_controller_mut(&mut self) -> &mut SelectController {
        &mut self.select
    }
}

fn edge_element(kind: PrintElementKind, edge: GraphEdge) -> PrintElement {
    PrintElement {
        kind,
        element: GraphElement::Edge(edge),
        selected: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Commit, CommitId, CommitStore};
    use crate::fragment::GraphFragment;
    use crate::permanent::{RefColorManager, SortType};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn graph() -> PermanentGraph {
        let c = |id: &str, parents: &[&str]| {
            Commit::new(id, parents.iter().map(|p| CommitId::from(*p)), Utc::now())
        };
        let mut store = CommitStore::new();
        store
            .extend(vec![
                c("m", &["x1", "y1"]),
                c("x1", &["x2"]),
                c("x2", &["x3"]),
                c("x3", &["base"]),
                c("y1", &["base"]),
                c("base", &["r"]),
                c("r", &[]),
            ])
            .unwrap();
        PermanentGraph::build(store, &RefColorManager::default(), SortType::LogOrder).unwrap()
    }

    fn x_run() -> GraphFragment {
        GraphFragment {
            upper: 0,
            lower: 5,
            interior: vec![1, 2, 3],
        }
    }

    fn node_columns(model: &PrintModel) -> Vec<usize> {
        (0..model.visible_row_count())
            .map(|r| model.get_graph_print_cell(r).unwrap().node_column)
            .collect()
    }

    #[test]
    fn expanded_graph_lays_out_lanes() {
        let g = graph();
        let model = PrintModel::build(&g, &FragmentManager::default(), false);
        assert_eq!(model.visible_rows(), &[0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(node_columns(&model), vec![0, 0, 0, 0, 1, 0, 0]);

        let top = model.get_graph_print_cell(0).unwrap();
        let starts: Vec<_> = top
            .elements
            .iter()
            .filter_map(|e| match e.kind {
                PrintElementKind::EdgeStart { from, to } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![(0, 0), (0, 1)]);

        // The second parent's edge passes x1..x3 in lane 1.
        let x2 = model.get_graph_print_cell(2).unwrap();
        assert!(x2
            .elements
            .iter()
            .any(|e| e.kind == PrintElementKind::EdgePass { column: 1 }));
        assert_eq!(x2.width(), 2);

        // Both branches join at base.
        let base = model.get_graph_print_cell(5).unwrap();
        let ends = base
            .elements
            .iter()
            .filter(|e| matches!(e.kind, PrintElementKind::EdgeEnd { .. }))
            .count();
        assert_eq!(ends, 2);
    }

    #[test]
    fn collapsed_fragment_becomes_long_edge() {
        let g = graph();
        let mut fm = FragmentManager::default();
        let before = PrintModel::build(&g, &fm, false);

        let request = fm.change_visibility(&g, &x_run());
        let mut model = before.clone();
        model.refresh(&g, &fm);
        assert_eq!(model.visible_rows(), &[0, 4, 5, 6]);
        assert_eq!(model.visible_range(&request), Some(0..4));
        assert_eq!(model.visible_row(2), None);
        assert_eq!(model.visible_row(5), Some(2));

        let long = GraphEdge::long(0, 5, 1);
        let top = model.get_graph_print_cell(0).unwrap();
        assert!(top
            .elements
            .iter()
            .any(|e| e.element == GraphElement::Edge(long)));
        assert_eq!(model.element_at(1, 0), Some(GraphElement::Edge(long)));
        assert_eq!(fm.relate_fragment(&g, &GraphElement::Edge(long)), Some(x_run()));

        fm.change_visibility(&g, &x_run());
        model.refresh(&g, &fm);
        assert_eq!(model.visible_rows(), before.visible_rows());
        assert_eq!(
            model.get_graph_print_cell(3),
            before.get_graph_print_cell(3)
        );
    }

    #[test]
    fn hidden_long_edges_drop_the_connector() {
        let g = graph();
        let mut fm = FragmentManager::default();
        fm.set_collapsed(&g, &x_run(), true);
        let mut model = PrintModel::build(&g, &fm, false);
        assert!(!model.are_long_edges_hidden());

        model.set_long_edge_visibility(&g, &fm, false);
        assert!(model.are_long_edges_hidden());
        let top = model.get_graph_print_cell(0).unwrap();
        assert!(!top.elements.iter().any(|e| match e.element {
            GraphElement::Edge(edge) => edge.is_long(),
            GraphElement::Node(_) => false,
        }));
        // y1 now takes the first lane.
        assert_eq!(node_columns(&model), vec![0, 0, 0, 0]);
    }

    #[test]
    fn selection_is_reflected_on_cells() {
        let g = graph();
        let fm = FragmentManager::default();
        let mut model = PrintModel::build(&g, &fm, false);
        model.select_controller_mut().select_fragment(&x_run());

        let cell = model.get_graph_print_cell(1).unwrap();
        for e in &cell.elements {
            // Only the edge to y1 leaves the fragment.
            let expected = e.element != GraphElement::Edge(GraphEdge::new(0, 4));
            assert_eq!(e.selected, expected, "{e:?}");
        }
        let y1 = model.get_graph_print_cell(4).unwrap();
        let node = y1
            .elements
            .iter()
            .find(|e| matches!(e.kind, PrintElementKind::Node { .. }))
            .unwrap();
        assert!(!node.selected);

        model.select_controller_mut().deselect_all();
        assert!(model
            .get_graph_print_cell(1)
            .unwrap()
            .elements
            .iter()
            .all(|e| !e.selected));
    }

    #[test]
    fn element_lookup_misses() {
        let g = graph();
        let model = PrintModel::build(&g, &FragmentManager::default(), false);
        assert_eq!(model.element_at(0, 0), Some(GraphElement::Node(0)));
        assert_eq!(model.element_at(0, 5), None);
        assert_eq!(model.element_at(99, 0), None);
        assert_eq!(model.visible_range(&UpdateRequest::Nothing), None);
    }
}
