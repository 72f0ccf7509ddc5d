use crate::core::GraphElement;
use crate::fragment::{FragmentManager, GraphFragment};
use crate::permanent::PermanentGraph;
use std::collections::BTreeSet;

/// Presentation-only highlight state.
///
/// A node is selected when its permanent row is; an edge when both ends are.
#[derive(Debug, Clone, Default)]
pub struct SelectController {
    rows: BTreeSet<usize>,
}

impl SelectController {
    pub fn deselect_all(&mut self) {
        self.rows.clear();
    }

    pub fn select_rows(&mut self, rows: impl IntoIterator<Item = usize>) {
        self.rows = rows.into_iter().collect();
    }

    pub fn select_fragment(&mut self, fragment: &GraphFragment) {
        self.select_rows(
            [fragment.upper, fragment.lower]
                .into_iter()
                .chain(fragment.interior.iter().copied()),
        );
    }

    pub fn select_branch(
        &mut self,
        graph: &PermanentGraph,
        fragments: &FragmentManager,
        row: usize,
    ) {
        self.rows = fragments.all_commits_current_branch(graph, row);
    }

    pub fn is_selected(&self, element: &GraphElement) -> bool {
        match element {
            GraphElement::Node(row) => self.rows.contains(row),
            GraphElement::Edge(edge) => self.rows.contains(&edge.up) && self.rows.contains(&edge.down),
        }
    }

    pub fn selected_rows(&self) -> &BTreeSet<usize> {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
