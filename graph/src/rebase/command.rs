use crate::core::{CommitId, VcsRef};
use serde::Serialize;
use std::fmt;

/// Where moved commits go relative to the anchor commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    /// Newer than the anchor
    Above,
    /// Older than the anchor, between it and its parent
    Below,
}

/// Identity of the planned copy of a real commit.
///
/// Derived from the original hash alone, so every reference to "the fake
/// version of X" agrees within a planning session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FakeHash(CommitId);

impl FakeHash {
    pub fn of(original: &CommitId) -> Self {
        Self(original.clone())
    }

    pub fn original(&self) -> &CommitId {
        &self.0
    }
}

impl fmt::Display for FakeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~", self.0)
    }
}

/// What a fake commit or the result ref points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainLink {
    Fake(FakeHash),
    Real(CommitId),
}

/// Synthetic ref shown in place of the branch tip while a plan exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FakeRef {
    pub name: String,
    pub target: ChainLink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FakeCommit {
    pub hash: FakeHash,
    pub parent: ChainLink,
    pub reworded: Option<String>,
    pub fixed_up: bool,
}

impl FakeCommit {
    pub fn original(&self) -> &CommitId {
        self.hash.original()
    }
}

/// One replay step handed to the VCS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebaseCommand {
    Pick(CommitId),
    Reword(CommitId, String),
    /// Fold into the result of the previous command, keeping its message
    Fixup(CommitId),
}

impl RebaseCommand {
    pub fn commit(&self) -> &CommitId {
        match self {
            RebaseCommand::Pick(id) | RebaseCommand::Reword(id, _) | RebaseCommand::Fixup(id) => id,
        }
    }
}

impl fmt::Display for RebaseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebaseCommand::Pick(id) => write!(f, "pick {}", id.short(8)),
            RebaseCommand::Reword(id, message) => write!(f, "reword {} {}", id.short(8), message),
            RebaseCommand::Fixup(id) => write!(f, "fixup {}", id.short(8)),
        }
    }
}

/// Snapshot of a planning session for UIs and `--json` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebasePlan {
    pub subject: VcsRef,
    pub base: CommitId,
    /// Newest first
    pub chain: Vec<FakeCommit>,
    pub selected: Vec<FakeHash>,
    pub insert_after: Option<usize>,
    pub result_ref: FakeRef,
    pub commands: Vec<RebaseCommand>,
}
