use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Opaque commit identifier (a hash in practice)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters, for display
    pub fn short(&self, len: usize) -> &str {
        match self.0.char_indices().nth(len) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CommitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Dense index of a commit inside a [`CommitStore`](super::CommitStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitIdx(pub(crate) u32);

impl CommitIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One VCS revision as read from the log: only what the graph needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: CommitId,
    pub parents: SmallVec<[CommitId; 2]>,
    pub timestamp: DateTime<Utc>,
}

impl Commit {
    pub fn new(
        id: impl Into<CommitId>,
        parents: impl IntoIterator<Item = CommitId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            parents: parents.into_iter().collect(),
            timestamp,
        }
    }

    /// Check if this is a root commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Check if this is a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// Full commit details, fetched on demand for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub id: CommitId,
    pub author: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// What a [`VcsRef`] names. Only local branches can be rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Head,
    #[default]
    Branch,
    Tag,
}

/// A named reference pointing at a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VcsRef {
    pub name: String,
    pub target: CommitId,
    #[serde(default)]
    pub kind: RefKind,
}

impl VcsRef {
    /// A local branch
    pub fn new(name: impl Into<String>, target: impl Into<CommitId>) -> Self {
        Self::with_kind(name, target, RefKind::Branch)
    }

    pub fn head(target: impl Into<CommitId>) -> Self {
        Self::with_kind("HEAD", target, RefKind::Head)
    }

    pub fn tag(name: impl Into<String>, target: impl Into<CommitId>) -> Self {
        Self::with_kind(name, target, RefKind::Tag)
    }

    pub fn with_kind(name: impl Into<String>, target: impl Into<CommitId>, kind: RefKind) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.kind == RefKind::Branch
    }
}
