//! Commit-graph engine for a VCS log view.
//!
//! Raw commits go into a [`CommitStore`], which is laid out as a
//! [`PermanentGraph`]. A [`FragmentManager`] tracks collapsed linear runs,
//! a [`PrintModel`] turns both into printable rows, and an
//! [`InteractiveRebaseBuilder`] plans history rewrites on top of it all.

pub mod core;
pub mod error;
pub mod fragment;
pub mod git_backend;
pub mod permanent;
pub mod print;
pub mod rebase;

pub use crate::core::{Commit, CommitDetail, CommitId, CommitIdx, CommitStore, EdgeKind, GraphEdge, GraphElement, RefKind, VcsRef};
pub use error::{GraphError, RebaseError};
pub use fragment::{FragmentManager, GraphFragment, UpdateRequest};
pub use git_backend::{GitLogProvider, VcsLogProvider};
pub use permanent::{GraphStats, HeadColorManager, PermanentGraph, RefColorManager, SortType};
pub use print::{GraphPrintCell, PrintElement, PrintElementKind, PrintModel, SelectController, TextPrinter};
pub use rebase::{
    FakeHash, FakeRef, InsertPosition, InteractiveRebaseBuilder, RebaseCallback, RebaseCommand, RebasePlan,
    RebaseState, VcsActionHandler,
};
