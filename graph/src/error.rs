use crate::core::CommitId;
use thiserror::Error;

/// Errors raised while loading commits or building the permanent graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("commit {0} was loaded twice")]
    DuplicateCommit(CommitId),
    #[error("commit {0} lists itself as a parent")]
    SelfParent(CommitId),
    #[error("commit history contains a cycle through {remaining} commits")]
    Cycle { remaining: usize },
}

/// Rejected interactive rebase requests. The plan is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RebaseError {
    #[error("{0} is not a local branch")]
    NotABranch(String),
    #[error("commit {0} is not loaded")]
    UnknownCommit(CommitId),
    #[error("commit {0} is not on the branch being rebased")]
    NotOnBranch(CommitId),
    #[error("cannot insert next to root commit {0}: it has no parent to build on")]
    RootAnchor(CommitId),
    #[error("{subject} shares no history with {onto}")]
    NoCommonAncestor { subject: String, onto: CommitId },
    #[error("{0} already contains the target")]
    NothingToRebase(String),
}
