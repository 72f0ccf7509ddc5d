use super::heads::HeadColorManager;
use super::sort::{sort_commits, SortType};
use crate::core::{CommitId, CommitIdx, CommitStore, GraphEdge};
use crate::error::GraphError;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Commit(CommitIdx),
    /// Marks where the loaded prefix of history stops
    NotLoaded,
}

/// One rendered row of the permanent graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRow {
    pub row: usize,
    pub kind: NodeKind,
}

/// The full commit DAG as loaded, laid out newest first.
#[derive(Debug, Clone)]
pub struct PermanentGraph {
    store: CommitStore,
    rows: Vec<NodeRow>,
    /// CommitIdx -> row
    commit_rows: Vec<usize>,
    up: Vec<SmallVec<[usize; 2]>>,
    down: Vec<SmallVec<[usize; 2]>>,
    /// Row of the head each row is drawn under
    heads: Vec<usize>,
    colors: Vec<u32>,
    sort: SortType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub total_commits: usize,
    pub total_edges: usize,
    pub merge_commits: usize,
    pub root_commits: usize,
    pub heads: usize,
    pub partial: bool,
}

impl PermanentGraph {
    pub fn build(
        store: CommitStore,
        colors: &dyn HeadColorManager,
        sort: SortType,
    ) -> Result<Self, GraphError> {
        let n = store.len();
        let mut parents: Vec<SmallVec<[CommitIdx; 2]>> = vec![SmallVec::new(); n];
        let mut unresolved = vec![false; n];
        for (idx, commit) in store.iter() {
            for parent in &commit.parents {
                match store.resolve(parent) {
                    Some(p) if !parents[idx.index()].contains(&p) => parents[idx.index()].push(p),
                    Some(_) => {}
                    None => unresolved[idx.index()] = true,
                }
            }
        }

        let order = sort_commits(&store, &parents, sort)?;

        let mut rows: Vec<NodeRow> = order
            .iter()
            .enumerate()
            .map(|(row, &idx)| NodeRow {
                row,
                kind: NodeKind::Commit(idx),
            })
            .collect();
        let mut commit_rows = vec![0usize; n];
        for (row, idx) in order.iter().enumerate() {
            commit_rows[idx.index()] = row;
        }

        let sentinel = unresolved.iter().any(|u| *u).then_some(n);
        if let Some(row) = sentinel {
            rows.push(NodeRow {
                row,
                kind: NodeKind::NotLoaded,
            });
        }

        let len = rows.len();
        let mut up: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); len];
        let mut down: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); len];
        for (row, idx) in order.iter().enumerate() {
            for p in &parents[idx.index()] {
                let parent_row = commit_rows[p.index()];
                down[row].push(parent_row);
                up[parent_row].push(row);
            }
            if let (true, Some(s)) = (unresolved[idx.index()], sentinel) {
                down[row].push(s);
                up[s].push(row);
            }
        }

        // Rows are visited top-down, so every child's head is known first.
        let mut heads = vec![0usize; len];
        for row in 0..len {
            heads[row] = if up[row].is_empty() {
                row
            } else {
                let mut best = heads[up[row][0]];
                for &child in &up[row][1..] {
                    let candidate = heads[child];
                    let a = store.id(commit_at(&rows, candidate));
                    let b = store.id(commit_at(&rows, best));
                    if colors.compare_heads(a, b).is_gt() {
                        best = candidate;
                    }
                }
                best
            };
        }
        let head_colors: Vec<u32> = heads
            .iter()
            .map(|&h| colors.color(store.id(commit_at(&rows, h))))
            .collect();

        debug!(
            commits = n,
            rows = len,
            partial = sentinel.is_some(),
            "built permanent graph"
        );

        Ok(Self {
            store,
            rows,
            commit_rows,
            up,
            down,
            heads,
            colors: head_colors,
            sort,
        })
    }

    pub fn empty() -> Self {
        Self {
            store: CommitStore::new(),
            rows: Vec::new(),
            commit_rows: Vec::new(),
            up: Vec::new(),
            down: Vec::new(),
            heads: Vec::new(),
            colors: Vec::new(),
            sort: SortType::default(),
        }
    }

    pub fn store(&self) -> &CommitStore {
        &self.store
    }

    pub fn sort_type(&self) -> SortType {
        self.sort
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn node_row(&self, row: usize) -> Option<&NodeRow> {
        self.rows.get(row)
    }

    pub fn commit_at(&self, row: usize) -> Option<CommitIdx> {
        match self.rows.get(row)?.kind {
            NodeKind::Commit(idx) => Some(idx),
            NodeKind::NotLoaded => None,
        }
    }

    pub fn commit_id_at(&self, row: usize) -> Option<&CommitId> {
        self.commit_at(row).map(|idx| self.store.id(idx))
    }

    pub fn row_of(&self, idx: CommitIdx) -> usize {
        self.commit_rows[idx.index()]
    }

    pub fn row_of_id(&self, id: &CommitId) -> Option<usize> {
        self.store.resolve(id).map(|idx| self.row_of(idx))
    }

    pub fn is_commit_row(&self, row: usize) -> bool {
        self.commit_at(row).is_some()
    }

    pub fn not_loaded_row(&self) -> Option<usize> {
        self.rows
            .last()
            .filter(|r| r.kind == NodeKind::NotLoaded)
            .map(|r| r.row)
    }

    pub fn is_partial(&self) -> bool {
        self.not_loaded_row().is_some()
    }

    /// Child rows, top-down
    pub fn up_rows(&self, row: usize) -> &[usize] {
        &self.up[row]
    }

    /// Parent rows, in parent order
    pub fn down_rows(&self, row: usize) -> &[usize] {
        &self.down[row]
    }

    pub fn down_edges(&self, row: usize) -> impl Iterator<Item = GraphEdge> + '_ {
        self.down[row].iter().map(move |&d| self.edge(row, d))
    }

    pub fn up_edges(&self, row: usize) -> impl Iterator<Item = GraphEdge> + '_ {
        self.up[row].iter().map(move |&u| self.edge(u, row))
    }

    pub fn edges(&self) -> impl Iterator<Item = GraphEdge> + '_ {
        (0..self.rows.len()).flat_map(move |row| self.down_edges(row))
    }

    fn edge(&self, up: usize, down: usize) -> GraphEdge {
        if self.is_commit_row(down) {
            GraphEdge::new(up, down)
        } else {
            GraphEdge::not_loaded(up, down)
        }
    }

    pub fn has_edge(&self, edge: &GraphEdge) -> bool {
        edge.up < self.rows.len() && self.down[edge.up].contains(&edge.down)
    }

    /// First loaded parent; `None` for roots and when the parent is not loaded yet.
    pub fn first_parent(&self, row: usize) -> Option<usize> {
        self.down[row]
            .first()
            .copied()
            .filter(|&p| self.is_commit_row(p))
    }

    /// Row of the head this row is drawn under
    pub fn one_of_heads(&self, row: usize) -> usize {
        self.heads[row]
    }

    pub fn head_color(&self, row: usize) -> u32 {
        self.colors[row]
    }

    /// Rows reachable through parent edges from `row`, including itself.
    pub fn ancestors(&self, row: usize) -> Vec<bool> {
        let mut seen = vec![false; self.rows.len()];
        let mut queue = VecDeque::from([row]);
        seen[row] = true;
        while let Some(r) = queue.pop_front() {
            for &d in &self.down[r] {
                if !seen[d] {
                    seen[d] = true;
                    queue.push_back(d);
                }
            }
        }
        seen
    }

    pub fn stats(&self) -> GraphStats {
        let commit_rows = || (0..self.rows.len()).filter(|&r| self.is_commit_row(r));
        GraphStats {
            total_commits: self.store.len(),
            total_edges: self.down.iter().map(|d| d.len()).sum(),
            merge_commits: commit_rows().filter(|&r| self.down[r].len() > 1).count(),
            root_commits: commit_rows().filter(|&r| self.down[r].is_empty()).count(),
            heads: commit_rows().filter(|&r| self.up[r].is_empty()).count(),
            partial: self.is_partial(),
        }
    }
}

fn commit_at(rows: &[NodeRow], row: usize) -> CommitIdx {
    match rows[row].kind {
        NodeKind::Commit(idx) => idx,
        // Heads are always commits: the sentinel only exists below a child.
        NodeKind::NotLoaded => CommitIdx(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Commit, VcsRef};
    use crate::permanent::RefColorManager;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn commit(id: &str, parents: &[&str], secs: i64) -> Commit {
        Commit::new(
            id,
            parents.iter().map(|p| CommitId::from(*p)),
            Utc.timestamp_opt(secs, 0).unwrap(),
        )
    }

    fn build(commits: Vec<Commit>, sort: SortType) -> PermanentGraph {
        let mut store = CommitStore::new();
        store.extend(commits).unwrap();
        PermanentGraph::build(store, &RefColorManager::default(), sort).unwrap()
    }

    fn ids(graph: &PermanentGraph) -> Vec<&str> {
        (0..graph.row_count())
            .map(|r| graph.commit_id_at(r).map(CommitId::as_str).unwrap_or("~"))
            .collect()
    }

    fn assert_children_above_parents(graph: &PermanentGraph) {
        for edge in graph.edges() {
            assert!(edge.up < edge.down, "{edge:?} points upwards");
        }
    }

    #[test]
    fn linear_history_keeps_log_order() {
        let g = build(
            vec![commit("d", &["c"], 4), commit("c", &["b"], 3), commit("b", &["a"], 2), commit("a", &[], 1)],
            SortType::LogOrder,
        );
        assert_eq!(ids(&g), vec!["d", "c", "b", "a"]);
        assert!(!g.is_partial());
        assert_children_above_parents(&g);
    }

    #[test]
    fn parent_order_beats_log_order() {
        // The log delivers a parent before its child.
        let g = build(
            vec![commit("a", &[], 1), commit("b", &["a"], 2), commit("c", &["b"], 3)],
            SortType::LogOrder,
        );
        assert_eq!(ids(&g), vec!["c", "b", "a"]);
        assert_children_above_parents(&g);
    }

    #[test]
    fn parent_order_beats_timestamps() {
        // Child has an older timestamp than its parent (clock skew).
        let g = build(
            vec![commit("child", &["parent"], 10), commit("parent", &[], 50), commit("other", &[], 30)],
            SortType::Date,
        );
        assert_eq!(ids(&g), vec!["other", "child", "parent"]);
        assert_children_above_parents(&g);
    }

    #[test]
    fn date_sort_interleaves_branches() {
        let g = build(
            vec![
                commit("m2", &["m1"], 5),
                commit("m1", &["base"], 3),
                commit("f1", &["base"], 4),
                commit("base", &[], 1),
            ],
            SortType::Date,
        );
        assert_eq!(ids(&g), vec!["m2", "f1", "m1", "base"]);
    }

    #[test]
    fn merge_edges_and_lookup() {
        let g = build(
            vec![
                commit("m", &["a", "f"], 4),
                commit("f", &["base"], 3),
                commit("a", &["base"], 2),
                commit("base", &[], 1),
            ],
            SortType::LogOrder,
        );
        let m = g.row_of_id(&"m".into()).unwrap();
        let f = g.row_of_id(&"f".into()).unwrap();
        let a = g.row_of_id(&"a".into()).unwrap();
        assert_eq!(g.down_rows(m), &[a, f]);
        assert_eq!(g.first_parent(m), Some(a));
        assert_eq!(g.up_rows(g.row_of_id(&"base".into()).unwrap()), &[f, a]);
        let stats = g.stats();
        assert_eq!(stats.merge_commits, 1);
        assert_eq!(stats.root_commits, 1);
        assert_eq!(stats.heads, 1);
        assert_eq!(stats.total_edges, 4);
    }

    #[test]
    fn unresolved_parents_point_at_sentinel() {
        let g = build(
            vec![commit("c", &["b"], 3), commit("x", &["b"], 2)],
            SortType::LogOrder,
        );
        assert_eq!(ids(&g), vec!["c", "x", "~"]);
        let sentinel = g.not_loaded_row().unwrap();
        assert_eq!(sentinel, 2);
        assert_eq!(g.up_rows(sentinel), &[0, 1]);
        assert_eq!(g.first_parent(0), None);
        assert!(g.down_edges(0).all(|e| e.kind == crate::core::EdgeKind::NotLoaded));
    }

    #[test]
    fn appended_page_keeps_prefix_rows() {
        let mut store = CommitStore::new();
        store
            .extend(vec![commit("e", &["d"], 5), commit("d", &["c"], 4), commit("z", &["c"], 4)])
            .unwrap();
        let first = PermanentGraph::build(store.clone(), &RefColorManager::default(), SortType::LogOrder).unwrap();
        assert_eq!(ids(&first), vec!["e", "d", "z", "~"]);

        store
            .extend(vec![commit("c", &["b"], 3), commit("b", &[], 2)])
            .unwrap();
        let second = PermanentGraph::build(store, &RefColorManager::default(), SortType::LogOrder).unwrap();
        assert_eq!(ids(&second), vec!["e", "d", "z", "c", "b"]);
        assert!(!second.is_partial());
    }

    #[test]
    fn heads_follow_color_manager_preference() {
        let mut store = CommitStore::new();
        store
            .extend(vec![
                commit("feat", &["base"], 3),
                commit("main", &["base"], 2),
                commit("base", &[], 1),
            ])
            .unwrap();
        let manager = RefColorManager::new(
            &[VcsRef::new("main", "main"), VcsRef::new("feature", "feat")],
            vec!["main".into()],
        );
        let g = PermanentGraph::build(store, &manager, SortType::LogOrder).unwrap();
        let base = g.row_of_id(&"base".into()).unwrap();
        let main = g.row_of_id(&"main".into()).unwrap();
        assert_eq!(g.one_of_heads(base), main);
        assert_eq!(g.head_color(base), g.head_color(main));
        assert_eq!(g.one_of_heads(g.row_of_id(&"feat".into()).unwrap()), 0);
    }

    #[test]
    fn ancestors_walk_all_parents() {
        let g = build(
            vec![
                commit("m", &["a", "f"], 4),
                commit("f", &["base"], 3),
                commit("a", &["base"], 2),
                commit("base", &[], 1),
                commit("lone", &[], 0),
            ],
            SortType::LogOrder,
        );
        let seen = g.ancestors(g.row_of_id(&"f".into()).unwrap());
        assert!(seen[g.row_of_id(&"base".into()).unwrap()]);
        assert!(!seen[g.row_of_id(&"a".into()).unwrap()]);
        assert!(!seen[g.row_of_id(&"lone".into()).unwrap()]);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut store = CommitStore::new();
        store
            .extend(vec![commit("a", &["b"], 1), commit("b", &["a"], 2)])
            .unwrap();
        let err = PermanentGraph::build(store, &RefColorManager::default(), SortType::LogOrder)
            .unwrap_err();
        assert!(matches!(err, GraphError::Cycle { remaining: 2 }));
    }
}
