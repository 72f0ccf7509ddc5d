//! Collapsible linear runs of commits ("fragments").
//!
//! A row is *interior* when it is a commit with exactly one child and one
//! parent. A fragment is a maximal chain of interior rows together with the
//! two non-interior rows bounding it. Collapsing a fragment hides its
//! interior; the print model then draws a long edge between the bounds.

use crate::core::{CommitIdx, EdgeKind, GraphElement};
use crate::permanent::PermanentGraph;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFragment {
    pub upper: usize,
    pub lower: usize,
    /// Hidden rows when collapsed, top-down
    pub interior: Vec<usize>,
}

impl GraphFragment {
    pub fn first_interior(&self) -> usize {
        self.interior[0]
    }

    pub fn contains(&self, row: usize) -> bool {
        row == self.upper || row == self.lower || self.interior.contains(&row)
    }
}

/// Rows that need repainting after a visibility change, in permanent rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRequest {
    Nothing,
    Rows { from: usize, to: usize },
    All,
}

#[derive(Debug, Clone)]
pub struct FragmentManager {
    /// Keyed by the commit of the top interior row, so it survives rebuilds
    collapsed: BTreeSet<CommitIdx>,
    min_fragment_len: usize,
}

impl Default for FragmentManager {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FragmentManager {
    pub fn new(min_fragment_len: usize) -> Self {
        Self {
            collapsed: BTreeSet::new(),
            min_fragment_len: min_fragment_len.max(1),
        }
    }

    pub fn relate_fragment(
        &self,
        graph: &PermanentGraph,
        element: &GraphElement,
    ) -> Option<GraphFragment> {
        match *element {
            GraphElement::Node(row) => {
                if row >= graph.row_count() {
                    warn!(row, "fragment lookup for a row outside the graph");
                    return None;
                }
                is_interior(graph, row).then(|| fragment_through(graph, row))
            }
            GraphElement::Edge(edge) => match edge.kind {
                EdgeKind::Long(first) => {
                    let fragment = self.collapsed_at(graph, first)?;
                    (fragment.upper == edge.up && fragment.lower == edge.down).then_some(fragment)
                }
                EdgeKind::Usual | EdgeKind::NotLoaded => {
                    if !graph.has_edge(&edge) {
                        warn!(?edge, "fragment lookup for an edge not in the graph");
                        return None;
                    }
                    [edge.up, edge.down]
                        .into_iter()
                        .find(|&row| is_interior(graph, row))
                        .map(|row| fragment_through(graph, row))
                }
            },
        }
    }

    pub fn is_collapsed(&self, graph: &PermanentGraph, fragment: &GraphFragment) -> bool {
        graph
            .commit_at(fragment.first_interior())
            .is_some_and(|idx| self.collapsed.contains(&idx))
    }

    /// Toggle a fragment between collapsed and expanded.
    pub fn change_visibility(
        &mut self,
        graph: &PermanentGraph,
        fragment: &GraphFragment,
    ) -> UpdateRequest {
        let collapse = !self.is_collapsed(graph, fragment);
        self.set_collapsed(graph, fragment, collapse)
    }

    /// Put a fragment into the given state; a no-op if it already is.
    pub fn set_collapsed(
        &mut self,
        graph: &PermanentGraph,
        fragment: &GraphFragment,
        collapsed: bool,
    ) -> UpdateRequest {
        let first = fragment.first_interior();
        let current = (first < graph.row_count() && is_fragment_top(graph, first))
            .then(|| fragment_through(graph, first));
        if current.as_ref() != Some(fragment) {
            warn!(?fragment, "visibility change for a stale fragment");
            return UpdateRequest::Nothing;
        }
        let Some(key) = graph.commit_at(first) else {
            return UpdateRequest::Nothing;
        };

        let changed = if collapsed {
            self.collapsed.insert(key)
        } else {
            self.collapsed.remove(&key)
        };
        if !changed {
            return UpdateRequest::Nothing;
        }
        debug!(
            upper = fragment.upper,
            lower = fragment.lower,
            collapsed,
            "fragment visibility changed"
        );
        UpdateRequest::Rows {
            from: fragment.upper,
            to: fragment.lower,
        }
    }

    pub fn show_all(&mut self) -> UpdateRequest {
        if self.collapsed.is_empty() {
            return UpdateRequest::Nothing;
        }
        self.collapsed.clear();
        UpdateRequest::All
    }

    pub fn hide_all(&mut self, graph: &PermanentGraph) -> UpdateRequest {
        self.hide_where(graph, |_| true)
    }

    /// Collapse the fragments whose key is not in `known`, leaving the
    /// state of fragments that existed before untouched.
    pub fn hide_new(&mut self, graph: &PermanentGraph, known: &BTreeSet<CommitIdx>) -> UpdateRequest {
        self.hide_where(graph, |key| !known.contains(&key))
    }

    /// Keys of every fragment in `graph`, whatever its visibility.
    pub fn fragment_keys(graph: &PermanentGraph) -> BTreeSet<CommitIdx> {
        all_fragments(graph)
            .iter()
            .filter_map(|fragment| graph.commit_at(fragment.first_interior()))
            .collect()
    }

    fn hide_where(&mut self, graph: &PermanentGraph, hide: impl Fn(CommitIdx) -> bool) -> UpdateRequest {
        let mut changed = false;
        for fragment in all_fragments(graph) {
            if fragment.interior.len() < self.min_fragment_len {
                continue;
            }
            if let Some(key) = graph.commit_at(fragment.first_interior()) {
                if hide(key) {
                    changed |= self.collapsed.insert(key);
                }
            }
        }
        if changed {
            UpdateRequest::All
        } else {
            UpdateRequest::Nothing
        }
    }

    /// Currently collapsed fragments, in row order.
    pub fn collapsed_fragments(&self, graph: &PermanentGraph) -> Vec<GraphFragment> {
        let mut fragments: Vec<GraphFragment> = self
            .collapsed
            .iter()
            .filter(|idx| idx.index() < graph.store().len())
            .filter_map(|&idx| self.collapsed_at(graph, graph.row_of(idx)))
            .collect();
        fragments.sort_by_key(|f| f.first_interior());
        fragments
    }

    pub fn hidden_rows(&self, graph: &PermanentGraph) -> Vec<bool> {
        let mut hidden = vec![false; graph.row_count()];
        for fragment in self.collapsed_fragments(graph) {
            for row in fragment.interior {
                hidden[row] = true;
            }
        }
        hidden
    }

    pub fn is_hidden(&self, graph: &PermanentGraph, row: usize) -> bool {
        if !is_interior(graph, row) {
            return false;
        }
        let fragment = fragment_through(graph, row);
        self.is_collapsed(graph, &fragment)
    }

    /// Forget collapsed fragments that no longer exist after a rebuild.
    pub fn retain_valid(&mut self, graph: &PermanentGraph) {
        let before = self.collapsed.len();
        self.collapsed.retain(|idx| {
            idx.index() < graph.store().len() && is_fragment_top(graph, graph.row_of(*idx))
        });
        if self.collapsed.len() != before {
            debug!(
                dropped = before - self.collapsed.len(),
                "dropped stale collapsed fragments"
            );
        }
    }

    fn collapsed_at(&self, graph: &PermanentGraph, first: usize) -> Option<GraphFragment> {
        let idx = graph.commit_at(first)?;
        (self.collapsed.contains(&idx) && is_fragment_top(graph, first))
            .then(|| fragment_through(graph, first))
    }

    /// Every commit reachable from `row` without leaving the branch it is
    /// drawn under.
    pub fn all_commits_current_branch(&self, graph: &PermanentGraph, row: usize) -> BTreeSet<usize> {
        let mut result = BTreeSet::new();
        if !graph.is_commit_row(row) {
            return result;
        }
        let head = graph.one_of_heads(row);
        let mut queue = VecDeque::from([row]);
        result.insert(row);
        while let Some(r) = queue.pop_front() {
            for &next in graph.up_rows(r).iter().chain(graph.down_rows(r)) {
                if graph.is_commit_row(next)
                    && graph.one_of_heads(next) == head
                    && result.insert(next)
                {
                    queue.push_back(next);
                }
            }
        }
        result
    }
}

fn is_interior(graph: &PermanentGraph, row: usize) -> bool {
    graph.is_commit_row(row) && graph.up_rows(row).len() == 1 && graph.down_rows(row).len() == 1
}

fn is_fragment_top(graph: &PermanentGraph, row: usize) -> bool {
    is_interior(graph, row) && !is_interior(graph, graph.up_rows(row)[0])
}

/// `row` must be interior.
fn fragment_through(graph: &PermanentGraph, row: usize) -> GraphFragment {
    let mut top = row;
    while is_interior(graph, graph.up_rows(top)[0]) {
        top = graph.up_rows(top)[0];
    }
    let upper = graph.up_rows(top)[0];

    let mut interior = vec![top];
    let mut current = top;
    loop {
        let next = graph.down_rows(current)[0];
        if !is_interior(graph, next) {
            return GraphFragment {
                upper,
                lower: next,
                interior,
            };
        }
        interior.push(next);
        current = next;
    }
}

fn all_fragments(graph: &PermanentGraph) -> Vec<GraphFragment> {
    (0..graph.row_count())
        .filter(|&row| is_fragment_top(graph, row))
        .map(|row| fragment_through(graph, row))
        .collect()
}
