use crate::core::{CommitIdx, CommitStore};
use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// How ready commits are ordered when several could take the next row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortType {
    /// Keep the order the VCS log delivered
    #[default]
    LogOrder,
    /// Newest timestamp first
    Date,
}

/// Order commits so every child precedes all of its loaded parents.
///
/// A commit becomes ready once all of its children are placed; among ready
/// commits the sort key decides. With `LogOrder` an already topological
/// input comes back unchanged, which keeps rows stable when pages are
/// appended.
pub(crate) fn sort_commits(
    store: &CommitStore,
    parents: &[SmallVec<[CommitIdx; 2]>],
    sort: SortType,
) -> Result<Vec<CommitIdx>, GraphError> {
    let n = store.len();
    let mut pending_children = vec![0usize; n];
    for ps in parents {
        for p in ps {
            pending_children[p.index()] += 1;
        }
    }

    let key = |idx: CommitIdx| -> (i64, u32) {
        match sort {
            SortType::LogOrder => (0, idx.0),
            SortType::Date => (-store.commit(idx).timestamp.timestamp_millis(), idx.0),
        }
    };

    let mut ready: BinaryHeap<Reverse<((i64, u32), CommitIdx)>> = store
        .iter()
        .map(|(idx, _)| idx)
        .filter(|idx| pending_children[idx.index()] == 0)
        .map(|idx| Reverse((key(idx), idx)))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse((_, idx))) = ready.pop() {
        order.push(idx);
        for p in &parents[idx.index()] {
            let count = &mut pending_children[p.index()];
            *count -= 1;
            if *count == 0 {
                ready.push(Reverse((key(*p), *p)));
            }
        }
    }

    if order.len() != n {
        return Err(GraphError::Cycle {
            remaining: n - order.len(),
        });
    }
    Ok(order)
}
