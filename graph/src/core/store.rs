use super::commit::{Commit, CommitId, CommitIdx};
use crate::error::GraphError;
use std::collections::{HashMap, HashSet};

/// Append-only arena of loaded commits.
///
/// Indices handed out by [`CommitStore::push`] never change: later history
/// pages are appended behind the ones already loaded.
#[derive(Debug, Clone, Default)]
pub struct CommitStore {
    commits: Vec<Commit>,
    index: HashMap<CommitId, CommitIdx>,
}

impl CommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, commit: Commit) -> Result<CommitIdx, GraphError> {
        Self::check(&commit)?;
        if self.index.contains_key(&commit.id) {
            return Err(GraphError::DuplicateCommit(commit.id));
        }
        Ok(self.insert(commit))
    }

    /// Append a whole page. Either every commit is added or none is.
    pub fn extend<I>(&mut self, page: I) -> Result<usize, GraphError>
    where
        I: IntoIterator<Item = Commit>,
    {
        let page: Vec<Commit> = page.into_iter().collect();
        let mut seen = HashSet::with_capacity(page.len());
        for commit in &page {
            Self::check(commit)?;
            if self.index.contains_key(&commit.id) || !seen.insert(&commit.id) {
                return Err(GraphError::DuplicateCommit(commit.id.clone()));
            }
        }

        let added = page.len();
        for commit in page {
            self.insert(commit);
        }
        Ok(added)
    }

    fn check(commit: &Commit) -> Result<(), GraphError> {
        if commit.parents.contains(&commit.id) {
            return Err(GraphError::SelfParent(commit.id.clone()));
        }
        Ok(())
    }

    fn insert(&mut self, commit: Commit) -> CommitIdx {
        let idx = CommitIdx(self.commits.len() as u32);
        self.index.insert(commit.id.clone(), idx);
        self.commits.push(commit);
        idx
    }

    pub fn resolve(&self, id: &CommitId) -> Option<CommitIdx> {
        self.index.get(id).copied()
    }

    pub fn commit(&self, idx: CommitIdx) -> &Commit {
        &self.commits[idx.index()]
    }

    pub fn id(&self, idx: CommitIdx) -> &CommitId {
        &self.commits[idx.index()].id
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CommitIdx, &Commit)> {
        self.commits
            .iter()
            .enumerate()
            .map(|(i, c)| (CommitIdx(i as u32), c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn commit(id: &str, parents: &[&str]) -> Commit {
        Commit::new(id, parents.iter().map(|p| CommitId::from(*p)), Utc::now())
    }

    #[test]
    fn indices_are_dense_and_stable() {
        let mut store = CommitStore::new();
        let b = store.push(commit("b", &["a"])).unwrap();
        store.extend(vec![commit("a", &[])]).unwrap();
        assert_eq!(b.index(), 0);
        assert_eq!(store.resolve(&"a".into()).map(CommitIdx::index), Some(1));
        assert_eq!(store.id(b).as_str(), "b");
    }

    #[test]
    fn rejects_self_parent() {
        let mut store = CommitStore::new();
        let err = store.push(commit("a", &["a"])).unwrap_err();
        assert!(matches!(err, GraphError::SelfParent(_)));
    }

    #[test]
    fn page_with_duplicate_is_rejected_whole() {
        let mut store = CommitStore::new();
        store.push(commit("a", &[])).unwrap();
        let err = store
            .extend(vec![commit("c", &["b"]), commit("a", &[])])
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateCommit(_)));
        assert_eq!(store.len(), 1);
        assert!(store.resolve(&"c".into()).is_none());
    }
}
